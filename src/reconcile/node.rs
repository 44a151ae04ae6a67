//! Single-node reconciliation.
//!
//! Given (previous VNode or absent, next VNode or absent, retained mount),
//! decide insert / update / replace / remove and apply the result through
//! the host adapter. Children recurse through the keyed reconciler, which
//! calls back in here per child.
//!
//! Compatibility rule: two nodes may share a host node iff they have the
//! same shape category, the same tag (elements, including namespace) or
//! component reference, and the same type tag. Anything else is a
//! remove-then-insert at the same position.

use smallvec::SmallVec;

use super::{Ctx, MountId, Mounted, SyncReport, Synchronizer};
use crate::adapter::HostAdapter;
use crate::diagnostics::{Diagnostic, NodeDescription, Phase};
use crate::error::SyncError;
use crate::types::Value;
use crate::vnode::{ElementData, VNode, VShape};

/// Whether `next` may reuse the host node attached for `prev`.
pub(crate) fn compatible(prev: &VNode, next: &VNode) -> bool {
    if prev.type_tag != next.type_tag {
        return false;
    }
    match (&prev.shape, &next.shape) {
        (VShape::Text(_), VShape::Text(_)) => true,
        (VShape::Element(a), VShape::Element(b)) => a.tag == b.tag && a.namespace == b.namespace,
        (VShape::Component(a), VShape::Component(b)) => a.reference == b.reference,
        _ => false,
    }
}

impl<A: HostAdapter> Synchronizer<A> {
    pub(crate) fn diag(&mut self, phase: Phase, node: &VNode, position: usize, message: String) {
        self.diagnostics
            .push(Diagnostic::report(phase, NodeDescription::of(node, Some(position)), message));
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Reconcile one position. Returns the mount now occupying it, or `None`
    /// when the position is empty after the call.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reconcile_node<'a>(
        &mut self,
        prev: Option<&VNode>,
        mount: Option<MountId>,
        next: Option<&'a VNode>,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        ctx: Ctx<'a>,
        position: usize,
        at_attachment: bool,
        report: &mut SyncReport,
    ) -> Result<Option<MountId>, SyncError<A::Error>> {
        // Overlay subtrees are invisible to an excluding pass in every
        // phase: not inserted, not updated, not removed.
        if ctx.exclude_marked {
            let marked = match (prev, next) {
                (_, Some(n)) => n.is_skipped(),
                (Some(p), None) => p.is_skipped(),
                (None, None) => false,
            };
            if marked {
                log::trace!("skipping overlay subtree at position {position}");
                return Ok(mount);
            }
        }

        let mount = mount.filter(|id| self.mounts.contains_key(*id));
        match (next, mount) {
            (None, None) => Ok(None),
            (Some(next_node), None) => Ok(Some(self.insert_node(
                next_node,
                parent,
                before,
                ctx,
                position,
                at_attachment,
                report,
            )?)),
            (None, Some(id)) => {
                self.remove_mount(id, prev, position, report);
                Ok(None)
            }
            (Some(next_node), Some(id)) => self
                .reconcile_pair(prev, id, next_node, parent, before, ctx, position, report)
                .map(Some),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn reconcile_pair<'a>(
        &mut self,
        prev: Option<&VNode>,
        id: MountId,
        next: &'a VNode,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        ctx: Ctx<'a>,
        position: usize,
        report: &mut SyncReport,
    ) -> Result<MountId, SyncError<A::Error>> {
        // A dead non-component mount is a position whose insert failed;
        // retry it as a fresh insert.
        let entry = &self.mounts[id];
        if entry.handle.is_none() && entry.component.is_none() {
            self.free_mount(id);
            return self.insert_node(next, parent, before, ctx, position, false, report);
        }

        // Incompatible or unknown previous content: remove, then insert at
        // the same position.
        let prev_node = match prev {
            Some(p) if compatible(p, next) => p,
            _ => {
                self.remove_mount(id, prev, position, report);
                return self.insert_node(next, parent, before, ctx, position, false, report);
            }
        };
        match (&prev_node.shape, &next.shape) {
            (VShape::Text(a), VShape::Text(b)) => {
                self.update_text(a, b, id, next, position, report);
                Ok(id)
            }
            (VShape::Element(prev_el), VShape::Element(next_el)) => {
                self.update_element(prev_el, next_el, next, id, ctx, position, report)?;
                Ok(id)
            }
            (VShape::Component(prev_data), VShape::Component(next_data)) => self.update_component(
                prev_data, next, next_data, id, parent, before, ctx, position, report,
            ),
            // compatible() rules this out; rebuild defensively if it happens.
            _ => {
                self.remove_mount(id, prev, position, report);
                self.insert_node(next, parent, before, ctx, position, false, report)
            }
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Create the host representation for `node` and attach it at the given
    /// position. Always yields a mount; a dead one on contained failure.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_node<'a>(
        &mut self,
        node: &'a VNode,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        ctx: Ctx<'a>,
        position: usize,
        at_attachment: bool,
        report: &mut SyncReport,
    ) -> Result<MountId, SyncError<A::Error>> {
        if ctx.exclude_marked && node.is_skipped() {
            log::trace!("not inserting overlay subtree at position {position}");
            return Ok(self.dead_mount());
        }

        match &node.shape {
            VShape::Text(content) => {
                let handle = match self.adapter.create_text(content) {
                    Ok(h) => h,
                    Err(e) => {
                        self.diag(Phase::Insert, node, position, format!("failed to create text node: {e}"));
                        return Ok(self.dead_mount());
                    }
                };
                report.nodes_created += 1;
                if !self.attach_handle(&handle, parent, before, node, position, at_attachment)? {
                    return Ok(self.dead_mount());
                }
                Ok(self.mounts.insert(Mounted {
                    handle: Some(handle),
                    children: SmallVec::new(),
                    component: None,
                }))
            }
            VShape::Element(el) => {
                self.insert_element(node, el, parent, before, ctx, position, at_attachment, report)
            }
            VShape::Component(data) => self.mount_component(
                node,
                data,
                parent,
                before,
                ctx,
                position,
                at_attachment,
                report,
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_element<'a>(
        &mut self,
        node: &'a VNode,
        el: &'a ElementData,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        ctx: Ctx<'a>,
        position: usize,
        at_attachment: bool,
        report: &mut SyncReport,
    ) -> Result<MountId, SyncError<A::Error>> {
        let namespace = el.namespace.as_deref().or(ctx.namespace);
        let handle = match self.adapter.create_element(&el.tag, namespace) {
            Ok(h) => h,
            Err(e) => {
                self.diag(Phase::Insert, node, position, format!("failed to create element: {e}"));
                return Ok(self.dead_mount());
            }
        };
        report.nodes_created += 1;

        for (name, value) in &el.attrs {
            if matches!(value, Value::Null) {
                continue;
            }
            if let Err(e) = self.adapter.set_attribute(&handle, name, Some(value)) {
                self.diag(Phase::Insert, node, position, format!("failed to set attribute {name}: {e}"));
            }
        }
        for (name, value) in &el.style {
            if let Err(e) = self.adapter.set_style_property(&handle, name, Some(value)) {
                self.diag(Phase::Insert, node, position, format!("failed to set style {name}: {e}"));
            }
        }
        if let Some(text) = &el.text {
            if let Err(e) = self.adapter.set_text(&handle, text) {
                self.diag(Phase::Insert, node, position, format!("failed to set text: {e}"));
            }
        }

        let child_ctx = match &el.namespace {
            Some(ns) => ctx.with_namespace(ns),
            None => ctx,
        };
        let children = self.insert_children(&el.children, &handle, child_ctx, report)?;

        if !self.attach_handle(&handle, parent, before, node, position, at_attachment)? {
            for id in children {
                self.free_mount(id);
            }
            return Ok(self.dead_mount());
        }
        Ok(self.mounts.insert(Mounted {
            handle: Some(handle),
            children,
            component: None,
        }))
    }

    /// Insert a created handle under its parent. A rejected insert at the
    /// attachment point is fatal; anywhere else it is contained (the created
    /// subtree is discarded best-effort).
    pub(crate) fn attach_handle(
        &mut self,
        handle: &A::Handle,
        parent: &A::Handle,
        before: Option<&A::Handle>,
        node: &VNode,
        position: usize,
        at_attachment: bool,
    ) -> Result<bool, SyncError<A::Error>> {
        match self.adapter.insert_child(parent, handle, before) {
            Ok(()) => Ok(true),
            Err(source) if at_attachment => Err(SyncError::Attach { source }),
            Err(e) => {
                self.diag(Phase::Insert, node, position, format!("failed to attach node: {e}"));
                let _ = self.adapter.remove_node(handle);
                Ok(false)
            }
        }
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Tear down a mounted position: run unmount hooks (depth-first, parent
    /// before descendants), detach the host node with a single adapter call,
    /// and free the arena entries. Children are discarded with the parent.
    pub(crate) fn remove_mount(
        &mut self,
        id: MountId,
        node: Option<&VNode>,
        position: usize,
        report: &mut SyncReport,
    ) {
        let handle = self.handle_of(id);
        self.teardown(id, report);
        if let Some(handle) = handle {
            if let Err(e) = self.adapter.remove_node(&handle) {
                let desc = match node {
                    Some(node) => NodeDescription::of(node, Some(position)),
                    None => NodeDescription::unknown(Some(position)),
                };
                self.diagnostics
                    .push(Diagnostic::report(Phase::Remove, desc, format!("failed to remove node: {e}")));
            }
            report.nodes_removed += 1;
        }
    }

    fn teardown(&mut self, id: MountId, report: &mut SyncReport) {
        let Some(entry) = self.mounts.remove(id) else {
            return;
        };
        if let Some(state) = entry.component {
            match state {
                super::ComponentState::External {
                    component, instance, ..
                } => {
                    if let Some(instance) = instance {
                        report.components_unmounted += 1;
                        if let Err(e) = component.unmount(&mut self.adapter, instance) {
                            self.diagnostics.push(Diagnostic::report(
                                Phase::Remove,
                                NodeDescription::unknown(None),
                                format!("unmount hook failed: {e}"),
                            ));
                        }
                    }
                }
                super::ComponentState::Context { inner, .. } => {
                    // A dead slot (render never succeeded) was never mounted,
                    // so it has no unmount to count.
                    if let Some(inner) = inner {
                        report.components_unmounted += 1;
                        self.teardown(inner, report);
                    }
                }
            }
        }
        for child in entry.children {
            self.teardown(child, report);
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    fn update_text(
        &mut self,
        prev: &str,
        next: &str,
        id: MountId,
        node: &VNode,
        position: usize,
        report: &mut SyncReport,
    ) {
        if prev == next {
            return;
        }
        let Some(handle) = self.handle_of(id) else {
            return;
        };
        match self.adapter.set_text(&handle, next) {
            Ok(()) => report.nodes_updated += 1,
            Err(e) => self.diag(Phase::Update, node, position, format!("failed to set text: {e}")),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update_element<'a>(
        &mut self,
        prev_el: &ElementData,
        next_el: &'a ElementData,
        node: &'a VNode,
        id: MountId,
        ctx: Ctx<'a>,
        position: usize,
        report: &mut SyncReport,
    ) -> Result<(), SyncError<A::Error>> {
        let Some(handle) = self.handle_of(id) else {
            return Ok(());
        };

        let mut changed = false;
        for op in super::diff_attrs(&prev_el.attrs, &next_el.attrs) {
            match self.adapter.set_attribute(&handle, op.name, op.value) {
                Ok(()) => changed = true,
                Err(e) => {
                    let name = op.name;
                    self.diag(Phase::Update, node, position, format!("failed to set attribute {name}: {e}"));
                }
            }
        }
        for op in super::diff_style(&prev_el.style, &next_el.style) {
            match self.adapter.set_style_property(&handle, op.name, op.value) {
                Ok(()) => changed = true,
                Err(e) => {
                    let name = op.name;
                    self.diag(Phase::Update, node, position, format!("failed to set style {name}: {e}"));
                }
            }
        }
        if prev_el.text != next_el.text {
            let text = next_el.text.as_deref().unwrap_or("");
            match self.adapter.set_text(&handle, text) {
                Ok(()) => changed = true,
                Err(e) => self.diag(Phase::Update, node, position, format!("failed to set text: {e}")),
            }
        }
        if changed {
            report.nodes_updated += 1;
        }

        let child_ctx = match &next_el.namespace {
            Some(ns) => ctx.with_namespace(ns),
            None => ctx,
        };
        self.reconcile_children(&prev_el.children, &next_el.children, id, &handle, child_ctx, report)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatible_same_tag() {
        let a = VNode::element("div");
        let b = VNode::element("div");
        assert!(compatible(&a, &b));
    }

    #[test]
    fn test_incompatible_shapes() {
        assert!(!compatible(&VNode::text("x"), &VNode::element("div")));
        assert!(!compatible(&VNode::element("div"), &VNode::component("Widget")));
    }

    #[test]
    fn test_incompatible_tags_and_references() {
        assert!(!compatible(&VNode::element("div"), &VNode::element("span")));
        assert!(!compatible(&VNode::component("A"), &VNode::component("B")));
    }

    #[test]
    fn test_type_tag_overrides_shape_similarity() {
        let a = VNode::element("span").with_type_tag("a");
        let b = VNode::element("span").with_type_tag("b");
        assert!(!compatible(&a, &b));

        // One side tagged, the other not: still incompatible.
        let untagged = VNode::element("span");
        assert!(!compatible(&a, &untagged));

        let a2 = VNode::element("span").with_type_tag("a");
        assert!(compatible(&a, &a2));
    }

    #[test]
    fn test_namespace_change_is_incompatible() {
        let a = VNode::element("svg").namespace("svg");
        let b = VNode::element("svg");
        assert!(!compatible(&a, &b));
    }

    #[test]
    fn test_text_always_compatible() {
        assert!(compatible(&VNode::text("a"), &VNode::text("b")));
    }
}
