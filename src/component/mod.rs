//! Component registry and lifecycle contracts.
//!
//! Two component kinds exist, modeled as a closed tagged union resolved once
//! at registry lookup time:
//!
//! - **Context components** are pure render functions with access to
//!   component-local state. They are re-invoked on every update and their
//!   output is reconciled like any other subtree.
//! - **External components** are imperative integrations with explicit
//!   mount/update/unmount hooks. They own an opaque instance and may claim
//!   exclusive ownership of their mounted subtree.
//!
//! Hook failures are values, not panics: every hook returns a `Result` and
//! the reconciler contains failures at the single component being processed.

mod state;

pub use state::{StateCx, StateMap};

use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::adapter::HostAdapter;
use crate::types::Props;
use crate::vnode::VNode;

/// Error raised inside a component hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Context components
// =============================================================================

/// A render function with component-local state.
pub trait ContextComponent {
    /// Produce the component's template for the given props and state.
    fn render(&self, props: &Props, state: &mut StateCx<'_>) -> Result<VNode, HookError>;
}

impl<F> ContextComponent for F
where
    F: Fn(&Props, &mut StateCx<'_>) -> Result<VNode, HookError>,
{
    fn render(&self, props: &Props, state: &mut StateCx<'_>) -> Result<VNode, HookError> {
        self(props, state)
    }
}

// =============================================================================
// External components
// =============================================================================

/// Result of an external component's mount hook.
pub struct ExternalMount<A: HostAdapter> {
    /// Root host node created by the component. The engine positions it
    /// among its siblings; the component never inserts it itself.
    pub handle: A::Handle,
    /// Opaque retained instance, handed back to `update` and `unmount`.
    pub instance: Box<dyn Any>,
}

/// An imperative component with explicit lifecycle hooks.
pub trait ExternalComponent<A: HostAdapter> {
    /// Create the component's host node and retained instance.
    ///
    /// The returned handle must be detached; the engine inserts it at the
    /// component's position.
    fn mount(&self, adapter: &mut A, props: &Props) -> Result<ExternalMount<A>, HookError>;

    /// Update the mounted instance for a prop change.
    ///
    /// The default is a no-op: a component without an update hook is static
    /// after mount.
    fn update(
        &self,
        _adapter: &mut A,
        _instance: &mut Box<dyn Any>,
        _prev_props: &Props,
        _next_props: &Props,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Tear down the instance. Runs exactly once, before the host node is
    /// detached.
    fn unmount(&self, _adapter: &mut A, _instance: Box<dyn Any>) -> Result<(), HookError> {
        Ok(())
    }

    /// Whether the component manages its own children.
    ///
    /// When true, the engine never traverses into the mounted subtree on
    /// update; its only responsibilities are the lifecycle hooks and keeping
    /// the node's position among its siblings.
    fn owns_children(&self) -> bool {
        false
    }
}

// =============================================================================
// Resolved component
// =============================================================================

/// A resolved component: context or external, matched exhaustively.
pub enum Component<A: HostAdapter> {
    /// Pure render function with component-local state.
    Context(Rc<dyn ContextComponent>),
    /// Imperative lifecycle object.
    External(Rc<dyn ExternalComponent<A>>),
}

impl<A: HostAdapter> Clone for Component<A> {
    fn clone(&self) -> Self {
        match self {
            Component::Context(c) => Component::Context(c.clone()),
            Component::External(c) => Component::External(c.clone()),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Resolves component references to implementations.
pub struct ComponentRegistry<A: HostAdapter> {
    entries: FxHashMap<String, Component<A>>,
}

impl<A: HostAdapter> Default for ComponentRegistry<A> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<A: HostAdapter> ComponentRegistry<A> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context component under a reference name.
    pub fn register_context(
        &mut self,
        name: impl Into<String>,
        component: impl ContextComponent + 'static,
    ) {
        self.entries
            .insert(name.into(), Component::Context(Rc::new(component)));
    }

    /// Register an external component under a reference name.
    pub fn register_external(
        &mut self,
        name: impl Into<String>,
        component: impl ExternalComponent<A> + 'static,
    ) {
        self.entries
            .insert(name.into(), Component::External(Rc::new(component)));
    }

    /// Resolve a component reference. `None` means the reference is unknown,
    /// which the reconciler reports as a structural diagnostic.
    pub fn resolve(&self, reference: &str) -> Option<Component<A>> {
        self.entries.get(reference).cloned()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTree;
    use crate::vnode::VNode;

    #[test]
    fn test_register_and_resolve_context() {
        let mut registry: ComponentRegistry<MemoryTree> = ComponentRegistry::new();
        registry.register_context(
            "Label",
            |_props: &Props, _state: &mut StateCx<'_>| -> Result<VNode, HookError> {
                Ok(VNode::text("hi"))
            },
        );

        assert!(matches!(
            registry.resolve("Label"),
            Some(Component::Context(_))
        ));
        assert!(registry.resolve("Missing").is_none());
    }

    #[test]
    fn test_external_defaults() {
        struct Static;
        impl ExternalComponent<MemoryTree> for Static {
            fn mount(
                &self,
                adapter: &mut MemoryTree,
                _props: &Props,
            ) -> Result<ExternalMount<MemoryTree>, HookError> {
                Ok(ExternalMount {
                    handle: adapter.create_element("widget", None)?,
                    instance: Box::new(()),
                })
            }
        }

        let comp = Static;
        assert!(!ExternalComponent::<MemoryTree>::owns_children(&comp));

        let mut tree = MemoryTree::new();
        let mount = comp.mount(&mut tree, &Props::new()).unwrap();
        let mut instance = mount.instance;
        // Default update hook is a no-op and must not fail.
        comp.update(&mut tree, &mut instance, &Props::new(), &Props::new())
            .unwrap();
        comp.unmount(&mut tree, instance).unwrap();
    }
}
