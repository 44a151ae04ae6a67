//! Diagnostics sink - contained-failure records.
//!
//! The reconciler never lets a single bad node abort a synchronization call
//! (see [`crate::error`] for the one exception). Instead each contained
//! failure is recorded here with enough context to identify the offending
//! VNode, and also emitted through `log` at `warn` level.

use std::fmt;

use crate::types::Key;
use crate::vnode::VNode;

/// Which phase of reconciliation the failure occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Creating and attaching a new subtree.
    Insert,
    /// Updating a compatible node in place.
    Update,
    /// Tearing down a subtree.
    Remove,
    /// Matching a child list (keyed reconciliation).
    Children,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Insert => "insert",
            Phase::Update => "update",
            Phase::Remove => "remove",
            Phase::Children => "children",
        };
        f.write_str(name)
    }
}

/// Identifies the VNode a diagnostic refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescription {
    /// Coarse node kind ("text", "element", "component").
    pub kind: &'static str,
    /// Tag name or component reference, if any.
    pub name: Option<String>,
    /// Sibling-matching key, if any.
    pub key: Option<Key>,
    /// Logical-type tag, if any.
    pub type_tag: Option<String>,
    /// Index among siblings at the time of the failure, if known.
    pub position: Option<usize>,
}

impl NodeDescription {
    /// Describe a VNode at an optional sibling position.
    pub fn of(node: &VNode, position: Option<usize>) -> Self {
        Self {
            kind: node.kind().name(),
            name: node.name().map(str::to_string),
            key: node.key.clone(),
            type_tag: node.type_tag.clone(),
            position,
        }
    }

    /// Describe a position whose VNode is no longer available.
    pub fn unknown(position: Option<usize>) -> Self {
        Self {
            kind: "node",
            name: None,
            key: None,
            type_tag: None,
            position,
        }
    }
}

impl fmt::Display for NodeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some(key) = &self.key {
            write!(f, " key={key}")?;
        }
        if let Some(tag) = &self.type_tag {
            write!(f, " type={tag}")?;
        }
        if let Some(position) = self.position {
            write!(f, " @{position}")?;
        }
        Ok(())
    }
}

/// One contained-failure record.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Phase the failure occurred in.
    pub phase: Phase,
    /// The offending VNode.
    pub node: NodeDescription,
    /// Human-readable failure description.
    pub message: String,
}

impl Diagnostic {
    /// Build a record and log it at `warn` level.
    pub(crate) fn report(phase: Phase, node: NodeDescription, message: impl Into<String>) -> Self {
        let message = message.into();
        log::warn!("reconcile {phase} failed for {node}: {message}");
        Self {
            phase,
            node,
            message,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
