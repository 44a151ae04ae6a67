//! Host Tree Adapter - the interface to the real, mutable target tree.
//!
//! The engine never touches the host tree directly; every structural or
//! attribute mutation goes through this trait. The adapter owns node
//! creation, attribute/style primitives, text assignment and child
//! placement. An in-memory implementation for tests and embedding lives in
//! [`crate::memory`].

use std::fmt;
use std::hash::Hash;

use crate::types::Value;

/// Primitive mutation interface to the external tree.
///
/// Handles are opaque references into the adapter's address space. The engine
/// clones and compares them but assigns them no meaning beyond identity.
///
/// Every operation is fallible. The engine contains most adapter failures at
/// the single node being processed (recorded as diagnostics); only a failure
/// that leaves no consistent partial result - the attachment point itself
/// rejecting an insert - aborts a synchronization call.
pub trait HostAdapter {
    /// Opaque node reference.
    type Handle: Clone + Eq + Hash + fmt::Debug;
    /// Adapter-side operation error.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a detached element node, optionally under a namespace.
    fn create_element(
        &mut self,
        tag: &str,
        namespace: Option<&str>,
    ) -> Result<Self::Handle, Self::Error>;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> Result<Self::Handle, Self::Error>;

    /// Set an attribute, or remove it when `value` is `None`.
    fn set_attribute(
        &mut self,
        node: &Self::Handle,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), Self::Error>;

    /// Set a style property, or remove it when `value` is `None`.
    fn set_style_property(
        &mut self,
        node: &Self::Handle,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), Self::Error>;

    /// Replace the node's text content.
    fn set_text(&mut self, node: &Self::Handle, text: &str) -> Result<(), Self::Error>;

    /// Insert `child` under `parent`, before `before` (or at the end).
    fn insert_child(
        &mut self,
        parent: &Self::Handle,
        child: &Self::Handle,
        before: Option<&Self::Handle>,
    ) -> Result<(), Self::Error>;

    /// Move an existing child of `parent` before `before` (or to the end).
    fn move_child(
        &mut self,
        parent: &Self::Handle,
        child: &Self::Handle,
        before: Option<&Self::Handle>,
    ) -> Result<(), Self::Error>;

    /// Detach and destroy a node together with its subtree.
    fn remove_node(&mut self, node: &Self::Handle) -> Result<(), Self::Error>;
}
