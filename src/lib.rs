//! # vtree
//!
//! Host-agnostic virtual tree reconciliation engine.
//!
//! Applications describe their UI as immutable [`VNode`] snapshots; the
//! engine diffs consecutive snapshots and mutates a retained host tree
//! through a [`HostAdapter`], touching only what changed.
//!
//! ## Architecture
//!
//! ```text
//! VNode snapshot → Synchronizer::synchronize → HostAdapter calls
//!                        |
//!                  mount arena (retained handles, component state)
//! ```
//!
//! The engine itself keeps no host-specific knowledge: element tags,
//! attributes and namespaces are opaque strings interpreted by the adapter.
//! An in-memory adapter ([`MemoryTree`]) ships with the crate for tests and
//! headless use.
//!
//! ## Modules
//!
//! - [`types`] - Keys, attribute values, event-handler references
//! - [`vnode`] - The immutable virtual node model and its builders
//! - [`adapter`] - The host adapter contract
//! - [`memory`] - In-memory reference adapter with operation counters
//! - [`component`] - Component registry and lifecycle contracts
//! - [`reconcile`] - The synchronization engine
//! - [`diagnostics`] - Contained-failure records
//! - [`error`] - Fatal synchronization errors

pub mod adapter;
pub mod component;
pub mod diagnostics;
pub mod error;
pub mod memory;
pub mod reconcile;
pub mod types;
pub mod vnode;

// Re-export commonly used items
pub use adapter::HostAdapter;
pub use component::{
    Component, ComponentRegistry, ContextComponent, ExternalComponent, ExternalMount, HookError,
    StateCx, StateMap,
};
pub use diagnostics::{Diagnostic, NodeDescription, Phase};
pub use error::SyncError;
pub use memory::{MemoryError, MemoryTree, NodeId, OpStats};
pub use reconcile::{SyncOptions, SyncReport, Synchronizer};
pub use types::{AttrMap, Handler, Key, Props, StyleMap, Value};
pub use vnode::{ComponentData, ElementData, NodeFlags, NodeKind, VNode, VShape};
