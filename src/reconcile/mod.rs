//! Reconciliation engine - the synchronization entry point.
//!
//! [`Synchronizer`] owns the host adapter, the component registry, the
//! retained mount arena and the diagnostics buffer. One call to
//! [`Synchronizer::synchronize`] brings the host tree in line with a new
//! VNode snapshot:
//!
//! ```text
//! synchronize -> reconcile_node -> reconcile_children -> reconcile_node ...
//!                     |                                        |
//!                lifecycle hooks                        host adapter calls
//! ```
//!
//! The engine is single-threaded and synchronous: a call runs to completion
//! and nothing else mutates the host tree while it does. Retained state
//! (attached handles, component instances) lives in a slotmap arena keyed
//! per attachment root, never on the VNodes themselves.

mod attrs;
mod children;
mod lifecycle;
mod node;

pub use attrs::{AttrOp, StyleOp, diff_attrs, diff_style};

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::adapter::HostAdapter;
use crate::component::{ComponentRegistry, ContextComponent, ExternalComponent, StateMap};
use crate::diagnostics::Diagnostic;
use crate::error::SyncError;
use crate::vnode::VNode;

new_key_type! {
    /// Slot in the retained mount arena.
    pub(crate) struct MountId;
}

// =============================================================================
// Options & context
// =============================================================================

/// Per-call options for [`Synchronizer::synchronize`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Ambient namespace for created elements. An element with its own
    /// namespace override pushes a new ambient namespace for its subtree.
    pub namespace: Option<String>,
    /// When set, subtrees whose root carries the skip flag are not visited:
    /// no adapter calls, no component hooks. They belong to a separate,
    /// independently scheduled overlay pass.
    pub exclude_marked: bool,
}

/// Reconcile context - ambient parameters threaded explicitly through every
/// recursive call. Immutable and stack-scoped: pushing a namespace means
/// passing a derived copy down, never mutating shared state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ctx<'a> {
    /// Current ambient namespace.
    pub namespace: Option<&'a str>,
    /// Whether skip-flagged subtrees are excluded from this call.
    pub exclude_marked: bool,
}

impl<'a> Ctx<'a> {
    fn for_options(options: &'a SyncOptions) -> Self {
        Self {
            namespace: options.namespace.as_deref(),
            exclude_marked: options.exclude_marked,
        }
    }

    /// Derive a context with a different ambient namespace.
    pub fn with_namespace(self, namespace: &'a str) -> Self {
        Self {
            namespace: Some(namespace),
            ..self
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Summary of the work one synchronization call performed.
///
/// Counters reflect engine decisions (a "move" is one reorder decision, even
/// though the adapter may implement it however it likes). Useful for tests,
/// profiling and caller-side scheduling heuristics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Host nodes created (elements and text runs).
    pub nodes_created: usize,
    /// Host nodes whose content or attributes changed in place.
    pub nodes_updated: usize,
    /// Host nodes moved among their siblings.
    pub nodes_moved: usize,
    /// Host subtrees removed.
    pub nodes_removed: usize,
    /// Components mounted.
    pub components_mounted: usize,
    /// Components whose update ran.
    pub components_updated: usize,
    /// Components unmounted.
    pub components_unmounted: usize,
}

impl SyncReport {
    /// Whether the call did any work at all.
    pub fn any_work(&self) -> bool {
        *self != SyncReport::default()
    }
}

// =============================================================================
// Mount arena
// =============================================================================

/// Retained state for one attached position.
///
/// `handle` is `None` for a dead mount: a position whose insert or mount
/// failed. Dead mounts keep sibling bookkeeping aligned and are retried when
/// a compatible snapshot arrives.
pub(crate) struct Mounted<A: HostAdapter> {
    /// Attached host node, owned by this position while it stays compatible.
    pub handle: Option<A::Handle>,
    /// Child mounts, in host sibling order (element children, or an external
    /// component's declared children).
    pub children: SmallVec<[MountId; 8]>,
    /// Component lifecycle state, for component positions only.
    pub component: Option<ComponentState<A>>,
}

/// Lifecycle state retained between mount and unmount.
///
/// The lifecycle manager is the sole writer of this state; VNodes never
/// carry instances.
pub(crate) enum ComponentState<A: HostAdapter> {
    /// A context component: render function, per-mount state, and the last
    /// rendered template to diff the next render against.
    Context {
        component: Rc<dyn ContextComponent>,
        state: StateMap,
        rendered: Option<VNode>,
        inner: Option<MountId>,
    },
    /// An external component: lifecycle object and retained instance.
    External {
        component: Rc<dyn ExternalComponent<A>>,
        instance: Option<Box<dyn Any>>,
        owns_children: bool,
    },
}

// =============================================================================
// Synchronizer
// =============================================================================

/// The reconciliation engine.
///
/// Owns the host adapter and all retained state. Reusable across sequential
/// synchronization calls and across independent attachment points; never
/// concurrent.
pub struct Synchronizer<A: HostAdapter> {
    pub(crate) adapter: A,
    pub(crate) registry: ComponentRegistry<A>,
    pub(crate) mounts: SlotMap<MountId, Mounted<A>>,
    roots: FxHashMap<A::Handle, MountId>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<A: HostAdapter> Synchronizer<A> {
    /// Create an engine over an adapter and a component registry.
    pub fn new(adapter: A, registry: ComponentRegistry<A>) -> Self {
        Self {
            adapter,
            registry,
            mounts: SlotMap::with_key(),
            roots: FxHashMap::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Borrow the host adapter.
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Mutably borrow the host adapter.
    ///
    /// Structural mutations made behind the engine's back are the caller's
    /// responsibility; attribute reads and host-side inspection are fine.
    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Mutably borrow the component registry (e.g. for late registration).
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry<A> {
        &mut self.registry
    }

    /// Diagnostics recorded so far (contained failures).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drain recorded diagnostics.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Synchronize the subtree under `attachment` from `prev` to `next`.
    ///
    /// `prev` must be the snapshot passed as `next` in the previous call for
    /// this attachment (or `None` on first call). The host tree is mutated
    /// minimally; contained failures become diagnostics, and only a rejected
    /// structural mutation at the attachment point itself aborts the call.
    pub fn synchronize(
        &mut self,
        prev: Option<&VNode>,
        next: Option<&VNode>,
        attachment: &A::Handle,
        options: &SyncOptions,
    ) -> Result<SyncReport, SyncError<A::Error>> {
        let mut report = SyncReport::default();
        let ctx = Ctx::for_options(options);
        let existing = self.roots.get(attachment).copied();

        log::trace!(
            "synchronize: prev={} next={} mounted={}",
            prev.is_some(),
            next.is_some(),
            existing.is_some()
        );

        let result = self.reconcile_node(
            prev,
            existing,
            next,
            attachment,
            None,
            ctx,
            0,
            true,
            &mut report,
        )?;

        match result {
            Some(id) => {
                self.roots.insert(attachment.clone(), id);
            }
            None => {
                self.roots.remove(attachment);
            }
        }
        Ok(report)
    }

    // =========================================================================
    // Arena helpers
    // =========================================================================

    /// Allocate a dead mount: a position with no host node, created when an
    /// insert or mount failed. Keeps sibling indices aligned.
    pub(crate) fn dead_mount(&mut self) -> MountId {
        self.mounts.insert(Mounted {
            handle: None,
            children: SmallVec::new(),
            component: None,
        })
    }

    /// Clone the live handle of a mount, if any.
    pub(crate) fn handle_of(&self, id: MountId) -> Option<A::Handle> {
        self.mounts.get(id).and_then(|m| m.handle.clone())
    }

    /// First live handle among the given mounts, used as an insertion anchor.
    pub(crate) fn first_live_handle(&self, ids: &[MountId]) -> Option<A::Handle> {
        ids.iter().find_map(|id| self.handle_of(*id))
    }

    /// Free a mount entry and its descendants from the arena. Does not touch
    /// the host tree.
    pub(crate) fn free_mount(&mut self, id: MountId) {
        let Some(entry) = self.mounts.remove(id) else {
            return;
        };
        for child in entry.children {
            self.free_mount(child);
        }
        if let Some(ComponentState::Context {
            inner: Some(inner), ..
        }) = entry.component
        {
            self.free_mount(inner);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::component::{ExternalMount, HookError, StateCx};
    use crate::diagnostics::Phase;
    use crate::memory::{MemoryTree, NodeId};
    use crate::types::{Props, Value};

    fn engine() -> (Synchronizer<MemoryTree>, NodeId) {
        let mut tree = MemoryTree::new();
        let root = tree.create_root();
        (Synchronizer::new(tree, ComponentRegistry::new()), root)
    }

    fn sync(
        engine: &mut Synchronizer<MemoryTree>,
        prev: Option<&VNode>,
        next: Option<&VNode>,
        root: NodeId,
    ) -> SyncReport {
        engine
            .synchronize(prev, next, &root, &SyncOptions::default())
            .unwrap()
    }

    // -------------------------------------------------------------------------
    // Hook-counting external component
    // -------------------------------------------------------------------------

    #[derive(Default)]
    struct Counts {
        mounts: usize,
        updates: usize,
        unmounts: usize,
    }

    struct Probe {
        counts: Rc<RefCell<Counts>>,
        fail_update: bool,
    }

    impl Probe {
        fn register(
            registry: &mut ComponentRegistry<MemoryTree>,
            name: &str,
            fail_update: bool,
        ) -> Rc<RefCell<Counts>> {
            let counts = Rc::new(RefCell::new(Counts::default()));
            registry.register_external(
                name,
                Probe {
                    counts: counts.clone(),
                    fail_update,
                },
            );
            counts
        }
    }

    impl crate::component::ExternalComponent<MemoryTree> for Probe {
        fn mount(
            &self,
            adapter: &mut MemoryTree,
            _props: &Props,
        ) -> Result<ExternalMount<MemoryTree>, HookError> {
            self.counts.borrow_mut().mounts += 1;
            Ok(ExternalMount {
                handle: adapter.create_element("widget", None)?,
                instance: Box::new(()),
            })
        }

        fn update(
            &self,
            _adapter: &mut MemoryTree,
            _instance: &mut Box<dyn std::any::Any>,
            _prev_props: &Props,
            _next_props: &Props,
        ) -> Result<(), HookError> {
            self.counts.borrow_mut().updates += 1;
            if self.fail_update {
                return Err("update exploded".into());
            }
            Ok(())
        }

        fn unmount(
            &self,
            _adapter: &mut MemoryTree,
            _instance: Box<dyn std::any::Any>,
        ) -> Result<(), HookError> {
            self.counts.borrow_mut().unmounts += 1;
            Ok(())
        }
    }

    // -------------------------------------------------------------------------
    // Insert & structure
    // -------------------------------------------------------------------------

    #[test]
    fn test_initial_insert_builds_structure() {
        let (mut engine, root) = engine();
        let next = VNode::element("div")
            .attr("class", "x")
            .child(VNode::text("hi"));

        let report = sync(&mut engine, None, Some(&next), root);
        assert_eq!(report.nodes_created, 2);

        let tree = engine.adapter();
        assert_eq!(tree.format_subtree(root), "(#root (div class=x \"hi\"))");
        assert_eq!(tree.stats.created, 2);
        assert_eq!(tree.stats.attrs_set, 1);
        // One insert per created node: the text under its parent, then the
        // finished subtree under the attachment.
        assert_eq!(tree.stats.inserted, 2);
    }

    #[test]
    fn test_round_trip_structure() {
        let (mut engine, root) = engine();
        let next = VNode::element("ul").attr("class", "list").children([
            VNode::element("li").with_key(1).text_content("one"),
            VNode::element("li").with_key(2).text_content("two"),
            VNode::text("tail"),
        ]);

        sync(&mut engine, None, Some(&next), root);
        assert_eq!(
            engine.adapter().format_subtree(root),
            "(#root (ul class=list (li \"one\") (li \"two\") \"tail\"))"
        );
    }

    #[test]
    fn test_remove_root() {
        let (mut engine, root) = engine();
        let next = VNode::element("div").child(VNode::text("x"));
        sync(&mut engine, None, Some(&next), root);
        engine.adapter_mut().reset_stats();

        let report = sync(&mut engine, Some(&next), None, root);
        assert_eq!(report.nodes_removed, 1);
        assert_eq!(engine.adapter().children(root), &[] as &[NodeId]);
        // The whole subtree goes in one adapter call.
        assert_eq!(engine.adapter().stats.removed, 1);
    }

    #[test]
    fn test_idempotence() {
        let (mut engine, root) = engine();
        let next = VNode::element("div")
            .attr("id", "a")
            .style_prop("color", "red")
            .children([
                VNode::text("x"),
                VNode::element("span").with_key("s").text_content("y"),
            ]);

        sync(&mut engine, None, Some(&next), root);
        engine.adapter_mut().reset_stats();

        let report = sync(&mut engine, Some(&next), Some(&next), root);
        assert!(!report.any_work());
        assert_eq!(engine.adapter().stats.total(), 0);
    }

    // -------------------------------------------------------------------------
    // Updates
    // -------------------------------------------------------------------------

    #[test]
    fn test_attribute_and_text_update_in_place() {
        let (mut engine, root) = engine();
        let prev = VNode::element("div")
            .attr("class", "a")
            .children([VNode::text("old"), VNode::text("same")]);
        let next = VNode::element("div")
            .attr("class", "b")
            .children([VNode::text("new"), VNode::text("same")]);

        sync(&mut engine, None, Some(&prev), root);
        let before: Vec<NodeId> = {
            let tree = engine.adapter();
            tree.children(tree.children(root)[0]).to_vec()
        };
        engine.adapter_mut().reset_stats();

        sync(&mut engine, Some(&prev), Some(&next), root);
        let tree = engine.adapter();
        assert_eq!(tree.stats.created, 0);
        assert_eq!(tree.stats.removed, 0);
        assert_eq!(tree.stats.attrs_set, 1);
        assert_eq!(tree.stats.text_set, 1);

        // Same handles, new content.
        let div = tree.children(root)[0];
        assert_eq!(tree.children(div), before.as_slice());
        assert_eq!(tree.text(before[0]), Some("new"));
    }

    #[test]
    fn test_unkeyed_positional_fallback() {
        let (mut engine, root) = engine();
        let prev = VNode::element("p").children([VNode::text("a"), VNode::text("b")]);
        let next = VNode::element("p").children([VNode::text("c"), VNode::text("b")]);

        sync(&mut engine, None, Some(&prev), root);
        engine.adapter_mut().reset_stats();
        sync(&mut engine, Some(&prev), Some(&next), root);

        let stats = &engine.adapter().stats;
        assert_eq!(stats.created, 0);
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.text_set, 1);
    }

    // -------------------------------------------------------------------------
    // Keyed children
    // -------------------------------------------------------------------------

    #[test]
    fn test_keyed_swap_is_one_move() {
        let (mut engine, root) = engine();
        let prev = VNode::element("ul")
            .children([VNode::text("a").with_key(1), VNode::text("b").with_key(2)]);
        let next = VNode::element("ul")
            .children([VNode::text("b").with_key(2), VNode::text("a").with_key(1)]);

        sync(&mut engine, None, Some(&prev), root);
        engine.adapter_mut().reset_stats();

        let report = sync(&mut engine, Some(&prev), Some(&next), root);
        assert_eq!(report.nodes_moved, 1);

        let stats = &engine.adapter().stats;
        assert_eq!(stats.moved, 1);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.removed, 0);
    }

    #[test]
    fn test_keyed_rotation_moves_one_node() {
        let (mut engine, root) = engine();
        let items = |order: &[i64]| {
            VNode::element("ul").children(
                order
                    .iter()
                    .map(|k| VNode::text(format!("item-{k}")).with_key(*k)),
            )
        };
        let prev = items(&[1, 2, 3, 4]);
        let next = items(&[4, 1, 2, 3]);

        sync(&mut engine, None, Some(&prev), root);
        engine.adapter_mut().reset_stats();
        let report = sync(&mut engine, Some(&prev), Some(&next), root);

        // Only the rotated node moves; the rest stay put.
        assert_eq!(report.nodes_moved, 1);
        assert_eq!(engine.adapter().stats.created, 0);
    }

    #[test]
    fn test_keyed_stability_preserves_handles() {
        let (mut engine, root) = engine();
        let items = |order: &[i64]| {
            VNode::element("ul")
                .children(order.iter().map(|k| VNode::text(format!("{k}")).with_key(*k)))
        };
        let prev = items(&[1, 2, 3]);
        let next = items(&[3, 2, 1]);

        sync(&mut engine, None, Some(&prev), root);
        let (ul, before) = {
            let tree = engine.adapter();
            let ul = tree.children(root)[0];
            (ul, tree.children(ul).to_vec())
        };

        sync(&mut engine, Some(&prev), Some(&next), root);
        let after = engine.adapter().children(ul).to_vec();

        // Same handles, reversed order: moved, never recreated.
        assert_eq!(after, before.iter().rev().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_keyed_insert_and_remove() {
        let (mut engine, root) = engine();
        let prev = VNode::element("ul")
            .children([VNode::text("a").with_key(1), VNode::text("b").with_key(2)]);
        let next = VNode::element("ul").children([
            VNode::text("c").with_key(3),
            VNode::text("a").with_key(1),
        ]);

        sync(&mut engine, None, Some(&prev), root);
        engine.adapter_mut().reset_stats();
        let report = sync(&mut engine, Some(&prev), Some(&next), root);

        assert_eq!(report.nodes_created, 1);
        assert_eq!(report.nodes_removed, 1);
        let tree = engine.adapter();
        let ul = tree.children(root)[0];
        let texts: Vec<_> = tree.children(ul).iter().map(|c| tree.text(*c)).collect();
        assert_eq!(texts, vec![Some("c"), Some("a")]);
    }

    #[test]
    fn test_duplicate_key_demoted_with_diagnostic() {
        let (mut engine, root) = engine();
        let prev = VNode::element("ul").children([VNode::text("x").with_key(1)]);
        let next = VNode::element("ul")
            .children([VNode::text("x").with_key(1), VNode::text("y").with_key(1)]);

        sync(&mut engine, None, Some(&prev), root);
        sync(&mut engine, Some(&prev), Some(&next), root);

        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].phase, Phase::Children);
        assert!(diags[0].message.contains("duplicate key"));

        // Both children exist; the duplicate was inserted positionally.
        let tree = engine.adapter();
        let ul = tree.children(root)[0];
        assert_eq!(tree.children(ul).len(), 2);
    }

    #[test]
    fn test_duplicate_key_diagnostic_on_first_insert() {
        let (mut engine, root) = engine();
        let next = VNode::element("ul")
            .children([VNode::text("x").with_key(1), VNode::text("y").with_key(1)]);

        // Duplicates in the very first snapshot: no update pass involved.
        sync(&mut engine, None, Some(&next), root);

        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].phase, Phase::Children);
        assert!(diags[0].message.contains("duplicate key"));

        // Both children inserted deterministically, in declared order.
        let tree = engine.adapter();
        let ul = tree.children(root)[0];
        let texts: Vec<_> = tree.children(ul).iter().map(|c| tree.text(*c)).collect();
        assert_eq!(texts, vec![Some("x"), Some("y")]);
    }

    #[test]
    fn test_duplicate_key_diagnostic_under_component_children() {
        let (mut engine, root) = engine();
        Probe::register(engine.registry_mut(), "Panel", false);

        let next = VNode::component("Panel")
            .children([VNode::text("x").with_key("k"), VNode::text("y").with_key("k")]);
        sync(&mut engine, None, Some(&next), root);

        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("duplicate key"));
    }

    // -------------------------------------------------------------------------
    // Compatibility & replacement
    // -------------------------------------------------------------------------

    #[test]
    fn test_type_tag_change_replaces_node() {
        let (mut engine, root) = engine();
        let prev = VNode::element("span").attr("class", "a").with_type_tag("a");
        let next = VNode::element("span").attr("class", "a").with_type_tag("b");

        sync(&mut engine, None, Some(&prev), root);
        engine.adapter_mut().reset_stats();
        sync(&mut engine, Some(&prev), Some(&next), root);

        let stats = &engine.adapter().stats;
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.created, 1);
        // Never an in-place diff: the one attribute set is the fresh insert.
        assert_eq!(stats.attrs_set, 1);
        assert_eq!(stats.attrs_removed, 0);
    }

    #[test]
    fn test_component_reference_change_replaces() {
        let (mut engine, root) = engine();
        let a = Probe::register(engine.registry_mut(), "A", false);
        let b = Probe::register(engine.registry_mut(), "B", false);

        let prev = VNode::component("A");
        let next = VNode::component("B");
        sync(&mut engine, None, Some(&prev), root);
        let report = sync(&mut engine, Some(&prev), Some(&next), root);

        assert_eq!(report.components_mounted, 1);
        assert_eq!(report.components_unmounted, 1);
        assert_eq!(a.borrow().unmounts, 1);
        assert_eq!(a.borrow().updates, 0);
        assert_eq!(b.borrow().mounts, 1);
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    #[test]
    fn test_external_update_runs_exactly_once() {
        let (mut engine, root) = engine();
        let counts = Probe::register(engine.registry_mut(), "Widget", false);

        let prev = VNode::component("Widget").prop("n", 1);
        let next = VNode::component("Widget").prop("n", 2);
        sync(&mut engine, None, Some(&prev), root);
        let handle = engine.adapter().children(root)[0];

        let report = sync(&mut engine, Some(&prev), Some(&next), root);
        assert_eq!(report.components_updated, 1);

        let counts = counts.borrow();
        assert_eq!((counts.mounts, counts.updates, counts.unmounts), (1, 1, 0));
        // Same retained host node across the update.
        assert_eq!(engine.adapter().children(root), &[handle]);
    }

    #[test]
    fn test_external_unmount_before_detach() {
        let (mut engine, root) = engine();
        let counts = Probe::register(engine.registry_mut(), "Widget", false);

        let prev = VNode::component("Widget");
        sync(&mut engine, None, Some(&prev), root);
        let report = sync(&mut engine, Some(&prev), None, root);

        assert_eq!(report.components_unmounted, 1);
        assert_eq!(counts.borrow().unmounts, 1);
        assert_eq!(engine.adapter().children(root), &[] as &[NodeId]);
    }

    #[test]
    fn test_external_declared_children() {
        let (mut engine, root) = engine();
        Probe::register(engine.registry_mut(), "Panel", false);

        let prev = VNode::component("Panel").child(VNode::text("a"));
        let next = VNode::component("Panel").child(VNode::text("b"));
        sync(&mut engine, None, Some(&prev), root);
        sync(&mut engine, Some(&prev), Some(&next), root);

        let tree = engine.adapter();
        let widget = tree.children(root)[0];
        assert_eq!(tree.tag(widget), Some("widget"));
        let inner = tree.children(widget);
        assert_eq!(inner.len(), 1);
        assert_eq!(tree.text(inner[0]), Some("b"));
    }

    #[test]
    fn test_exclusive_ownership_skips_children() {
        struct Owning;
        impl crate::component::ExternalComponent<MemoryTree> for Owning {
            fn mount(
                &self,
                adapter: &mut MemoryTree,
                _props: &Props,
            ) -> Result<ExternalMount<MemoryTree>, HookError> {
                Ok(ExternalMount {
                    handle: adapter.create_element("canvas", None)?,
                    instance: Box::new(()),
                })
            }
            fn owns_children(&self) -> bool {
                true
            }
        }

        let (mut engine, root) = engine();
        engine.registry_mut().register_external("Canvas", Owning);

        let prev = VNode::component("Canvas").child(VNode::text("a"));
        let next = VNode::component("Canvas").child(VNode::text("b"));
        sync(&mut engine, None, Some(&prev), root);
        sync(&mut engine, Some(&prev), Some(&next), root);

        // Declared children are never materialized under an owning component.
        let tree = engine.adapter();
        let canvas = tree.children(root)[0];
        assert_eq!(tree.children(canvas), &[] as &[NodeId]);
    }

    #[test]
    fn test_context_component_renders_and_retains_state() {
        let (mut engine, root) = engine();
        engine.registry_mut().register_context(
            "Counter",
            |props: &Props, state: &mut StateCx<'_>| -> Result<VNode, HookError> {
                let renders = match state.init_state("renders", 0) {
                    Value::Int(n) => n,
                    _ => 0,
                };
                state.set_state("renders", renders + 1);
                let label = match props.get("label") {
                    Some(Value::Str(s)) => s.clone(),
                    _ => String::new(),
                };
                Ok(VNode::element("div")
                    .attr("data-renders", renders + 1)
                    .text_content(label))
            },
        );

        let prev = VNode::component("Counter").prop("label", "a");
        let next = VNode::component("Counter").prop("label", "b");

        let report = sync(&mut engine, None, Some(&prev), root);
        assert_eq!(report.components_mounted, 1);
        {
            let tree = engine.adapter();
            let div = tree.children(root)[0];
            assert_eq!(tree.attr(div, "data-renders"), Some(&Value::Int(1)));
            assert_eq!(tree.text(div), Some("a"));
        }

        engine.adapter_mut().reset_stats();
        let report = sync(&mut engine, Some(&prev), Some(&next), root);
        assert_eq!(report.components_updated, 1);

        let tree = engine.adapter();
        // Output reconciled in place: no new nodes, state carried over.
        assert_eq!(tree.stats.created, 0);
        let div = tree.children(root)[0];
        assert_eq!(tree.attr(div, "data-renders"), Some(&Value::Int(2)));
        assert_eq!(tree.text(div), Some("b"));
    }

    #[test]
    fn test_unknown_component_reference() {
        let (mut engine, root) = engine();
        let next = VNode::element("div")
            .children([VNode::component("Missing"), VNode::text("after")]);

        sync(&mut engine, None, Some(&next), root);

        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown component reference"));

        // The sibling after the failed position still rendered.
        let tree = engine.adapter();
        let div = tree.children(root)[0];
        assert_eq!(tree.children(div).len(), 1);
        assert_eq!(tree.text(tree.children(div)[0]), Some("after"));
    }

    // -------------------------------------------------------------------------
    // Failure containment
    // -------------------------------------------------------------------------

    #[test]
    fn test_failing_update_does_not_break_siblings() {
        let (mut engine, root) = engine();
        let counts = Probe::register(engine.registry_mut(), "Flaky", true);

        let prev = VNode::element("div").children([
            VNode::component("Flaky").with_key("c").prop("n", 1),
            VNode::element("span").with_key("s").attr("class", "a"),
        ]);
        let next = VNode::element("div").children([
            VNode::component("Flaky").with_key("c").prop("n", 2),
            VNode::element("span").with_key("s").attr("class", "b"),
        ]);

        sync(&mut engine, None, Some(&prev), root);
        sync(&mut engine, Some(&prev), Some(&next), root);

        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].phase, Phase::Update);
        assert!(diags[0].message.contains("update exploded"));

        // The failed component was torn down, the sibling updated normally.
        assert_eq!(counts.borrow().unmounts, 1);
        let tree = engine.adapter();
        let div = tree.children(root)[0];
        assert_eq!(tree.children(div).len(), 1);
        let span = tree.children(div)[0];
        assert_eq!(tree.attr(span, "class"), Some(&Value::Str("b".into())));
    }

    #[test]
    fn test_failed_component_remounts_on_next_pass() {
        let (mut engine, root) = engine();
        let counts = Probe::register(engine.registry_mut(), "Flaky", true);

        let v = |n: i64| {
            VNode::element("div").children([
                VNode::component("Flaky").with_key("c").prop("n", n),
                VNode::element("span").with_key("s"),
            ])
        };
        let a = v(1);
        let b = v(2);
        let c = v(3);

        sync(&mut engine, None, Some(&a), root);
        sync(&mut engine, Some(&a), Some(&b), root);
        // Update failed; the position is vacant but retained.
        sync(&mut engine, Some(&b), Some(&c), root);

        assert_eq!(counts.borrow().mounts, 2);
        let tree = engine.adapter();
        let div = tree.children(root)[0];
        // Remounted before its surviving sibling.
        assert_eq!(tree.children(div).len(), 2);
        assert_eq!(tree.tag(tree.children(div)[0]), Some("widget"));
        assert_eq!(tree.tag(tree.children(div)[1]), Some("span"));
    }

    #[test]
    fn test_failing_render_is_contained() {
        let (mut engine, root) = engine();
        engine.registry_mut().register_context(
            "Broken",
            |_props: &Props, _state: &mut StateCx<'_>| -> Result<VNode, HookError> {
                Err("render exploded".into())
            },
        );

        let next = VNode::element("div")
            .children([VNode::component("Broken"), VNode::text("ok")]);
        sync(&mut engine, None, Some(&next), root);

        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("render exploded"));

        let tree = engine.adapter();
        let div = tree.children(root)[0];
        assert_eq!(tree.children(div).len(), 1);
        assert_eq!(tree.text(tree.children(div)[0]), Some("ok"));
    }

    #[test]
    fn test_failed_mount_render_balances_lifecycle_counters() {
        let (mut engine, root) = engine();
        engine.registry_mut().register_context(
            "Broken",
            |_props: &Props, _state: &mut StateCx<'_>| -> Result<VNode, HookError> {
                Err("render exploded".into())
            },
        );

        let next = VNode::component("Broken");
        let report = sync(&mut engine, None, Some(&next), root);
        assert_eq!(report.components_mounted, 0);

        // Removing the never-mounted slot must not count an unmount.
        let report = sync(&mut engine, Some(&next), None, root);
        assert_eq!(report.components_unmounted, 0);
    }

    #[test]
    fn test_rejected_attachment_insert_is_fatal() {
        let (mut engine, root) = engine();
        engine.adapter_mut().remove_node(&root).unwrap();

        let next = VNode::text("orphan");
        let result = engine.synchronize(None, Some(&next), &root, &SyncOptions::default());
        assert!(matches!(result, Err(SyncError::Attach { .. })));
    }

    // -------------------------------------------------------------------------
    // Overlay exclusion
    // -------------------------------------------------------------------------

    fn excluding() -> SyncOptions {
        SyncOptions {
            exclude_marked: true,
            ..SyncOptions::default()
        }
    }

    #[test]
    fn test_exclusion_skips_marked_subtree() {
        let (mut engine, root) = engine();
        let counts = Probe::register(engine.registry_mut(), "Overlay", false);

        let next = VNode::element("div").children([
            VNode::element("span"),
            VNode::element("aside")
                .skipped()
                .child(VNode::component("Overlay")),
        ]);

        engine
            .synchronize(None, Some(&next), &root, &excluding())
            .unwrap();

        // Nothing inside the marked subtree was touched: no node, no hook.
        assert_eq!(counts.borrow().mounts, 0);
        let tree = engine.adapter();
        let div = tree.children(root)[0];
        assert_eq!(tree.children(div).len(), 1);
        assert_eq!(tree.tag(tree.children(div)[0]), Some("span"));

        // Exactly the adapter calls for div and span, nothing else: no
        // create-then-discard happened inside the marked subtree.
        assert_eq!(tree.stats.created, 2);
        assert_eq!(tree.stats.inserted, 2);
        assert_eq!(tree.stats.total(), 4);
    }

    #[test]
    fn test_exclusion_leaves_marked_subtree_on_update_and_remove() {
        let (mut engine, root) = engine();
        let overlay = VNode::element("aside").skipped().text_content("overlay");
        let prev = VNode::element("div").children([VNode::element("span"), overlay.clone()]);

        // Build everything with an including pass first.
        sync(&mut engine, None, Some(&prev), root);
        let (div, aside) = {
            let tree = engine.adapter();
            let div = tree.children(root)[0];
            (div, tree.children(div)[1])
        };
        engine.adapter_mut().reset_stats();

        // Excluding pass that drops the overlay from the snapshot: the
        // attached overlay node must survive untouched.
        let next = VNode::element("div").children([VNode::element("span")]);
        engine
            .synchronize(Some(&prev), Some(&next), &root, &excluding())
            .unwrap();

        let tree = engine.adapter();
        assert!(tree.contains(aside));
        assert_eq!(tree.children(div), &[tree.children(div)[0], aside]);
        assert_eq!(tree.stats.removed, 0);
    }

    #[test]
    fn test_overlay_pass_picks_up_excluded_subtree() {
        let (mut engine, root) = engine();
        let snapshot = VNode::element("div").children([
            VNode::element("span"),
            VNode::element("aside").skipped().text_content("overlay"),
        ]);

        // Primary pass excludes the overlay, leaving a vacant position.
        engine
            .synchronize(None, Some(&snapshot), &root, &excluding())
            .unwrap();
        // Overlay pass over the same snapshot fills it in.
        sync(&mut engine, Some(&snapshot), Some(&snapshot), root);

        let tree = engine.adapter();
        let div = tree.children(root)[0];
        assert_eq!(tree.children(div).len(), 2);
        assert_eq!(tree.tag(tree.children(div)[1]), Some("aside"));
    }
}
