//! In-memory host tree - the reference [`HostAdapter`] implementation.
//!
//! Backs the crate's own tests and is useful for embedding tests downstream:
//! a slotmap-based node store with ordered children, plus an [`OpStats`]
//! block counting every adapter call so tests can assert mutation minimality
//! (e.g. "a keyed reorder is one move, zero creates").

use indexmap::IndexMap;
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

use crate::adapter::HostAdapter;
use crate::types::Value;

new_key_type! {
    /// Handle into the in-memory tree.
    pub struct NodeId;
}

/// Error raised by the in-memory tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    /// Operation referenced a handle that is not (or no longer) in the tree.
    #[error("unknown node handle {0:?}")]
    UnknownNode(NodeId),
    /// `before` handle was not a child of the given parent.
    #[error("anchor {0:?} is not a child of {1:?}")]
    BadAnchor(NodeId, NodeId),
    /// Text mutation attempted on an element without a text payload slot.
    #[error("node {0:?} does not hold text")]
    NotText(NodeId),
}

/// Node content: element or text run.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryContent {
    /// Element with tag and optional namespace / direct text payload.
    Element {
        /// Tag name.
        tag: String,
        /// Namespace the element was created under.
        namespace: Option<String>,
        /// Direct text payload (set via `set_text`).
        text: Option<String>,
    },
    /// Text run.
    Text(String),
}

/// One stored node.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    /// Element or text content.
    pub content: MemoryContent,
    /// Attributes in set order.
    pub attrs: IndexMap<String, Value>,
    /// Style properties in set order.
    pub style: IndexMap<String, String>,
    /// Ordered child handles.
    pub children: Vec<NodeId>,
    /// Parent handle, `None` while detached.
    pub parent: Option<NodeId>,
}

/// Adapter call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpStats {
    /// Nodes created (`create_element` + `create_text`).
    pub created: usize,
    /// `insert_child` calls.
    pub inserted: usize,
    /// `move_child` calls.
    pub moved: usize,
    /// `remove_node` calls.
    pub removed: usize,
    /// Attribute sets (value present).
    pub attrs_set: usize,
    /// Attribute removals (value absent).
    pub attrs_removed: usize,
    /// Style property sets and removals.
    pub style_set: usize,
    /// `set_text` calls.
    pub text_set: usize,
}

impl OpStats {
    /// Total number of adapter calls recorded.
    pub fn total(&self) -> usize {
        self.created
            + self.inserted
            + self.moved
            + self.removed
            + self.attrs_set
            + self.attrs_removed
            + self.style_set
            + self.text_set
    }
}

// =============================================================================
// MemoryTree
// =============================================================================

/// In-memory host tree.
#[derive(Debug, Default)]
pub struct MemoryTree {
    nodes: SlotMap<NodeId, MemoryNode>,
    /// Adapter call counters, reset with [`MemoryTree::reset_stats`].
    pub stats: OpStats,
}

impl MemoryTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached root element to synchronize under.
    ///
    /// Not counted in [`OpStats`]: attachment points are the caller's, not
    /// the reconciler's.
    pub fn create_root(&mut self) -> NodeId {
        self.nodes.insert(MemoryNode {
            content: MemoryContent::Element {
                tag: "#root".to_string(),
                namespace: None,
                text: None,
            },
            attrs: IndexMap::new(),
            style: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        })
    }

    /// Clear the call counters.
    pub fn reset_stats(&mut self) {
        self.stats = OpStats::default();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether the handle is live.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Borrow a node.
    pub fn get(&self, id: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    /// Tag name of an element node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.content {
            MemoryContent::Element { tag, .. } => Some(tag),
            MemoryContent::Text(_) => None,
        }
    }

    /// Text content (text nodes and element text payloads).
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id)?.content {
            MemoryContent::Element { text, .. } => text.as_deref(),
            MemoryContent::Text(s) => Some(s),
        }
    }

    /// Ordered children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Attribute value on a node.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.nodes.get(id)?.attrs.get(name)
    }

    /// Style property on a node.
    pub fn style(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(id)?.style.get(name).map(String::as_str)
    }

    /// Render a subtree as a compact s-expression, for test assertions.
    ///
    /// Elements render as `(tag attr=value.. "text" children..)`, text runs
    /// as quoted strings.
    pub fn format_subtree(&self, id: NodeId) -> String {
        let Some(node) = self.nodes.get(id) else {
            return "<dead>".to_string();
        };
        match &node.content {
            MemoryContent::Text(s) => format!("{s:?}"),
            MemoryContent::Element { tag, text, .. } => {
                let mut out = format!("({tag}");
                for (name, value) in &node.attrs {
                    match value {
                        Value::Str(s) => out.push_str(&format!(" {name}={s}")),
                        other => out.push_str(&format!(" {name}={other:?}")),
                    }
                }
                if let Some(text) = text {
                    out.push_str(&format!(" {text:?}"));
                }
                for child in &node.children {
                    out.push(' ');
                    out.push_str(&self.format_subtree(*child));
                }
                out.push(')');
                out
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn detach(&mut self, id: NodeId) -> Result<(), MemoryError> {
        let parent = self
            .nodes
            .get(id)
            .ok_or(MemoryError::UnknownNode(id))?
            .parent;
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|c| *c != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = None;
        }
        Ok(())
    }

    fn free_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.free_subtree(child);
            }
        }
    }

    fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), MemoryError> {
        if !self.nodes.contains_key(child) {
            return Err(MemoryError::UnknownNode(child));
        }
        let parent_node = self
            .nodes
            .get_mut(parent)
            .ok_or(MemoryError::UnknownNode(parent))?;
        match before {
            Some(anchor) => {
                let pos = parent_node
                    .children
                    .iter()
                    .position(|c| *c == anchor)
                    .ok_or(MemoryError::BadAnchor(anchor, parent))?;
                parent_node.children.insert(pos, child);
            }
            None => parent_node.children.push(child),
        }
        if let Some(child_node) = self.nodes.get_mut(child) {
            child_node.parent = Some(parent);
        }
        Ok(())
    }
}

// =============================================================================
// HostAdapter impl
// =============================================================================

impl HostAdapter for MemoryTree {
    type Handle = NodeId;
    type Error = MemoryError;

    fn create_element(
        &mut self,
        tag: &str,
        namespace: Option<&str>,
    ) -> Result<NodeId, MemoryError> {
        self.stats.created += 1;
        Ok(self.nodes.insert(MemoryNode {
            content: MemoryContent::Element {
                tag: tag.to_string(),
                namespace: namespace.map(str::to_string),
                text: None,
            },
            attrs: IndexMap::new(),
            style: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }))
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, MemoryError> {
        self.stats.created += 1;
        Ok(self.nodes.insert(MemoryNode {
            content: MemoryContent::Text(text.to_string()),
            attrs: IndexMap::new(),
            style: IndexMap::new(),
            children: Vec::new(),
            parent: None,
        }))
    }

    fn set_attribute(
        &mut self,
        node: &NodeId,
        name: &str,
        value: Option<&Value>,
    ) -> Result<(), MemoryError> {
        let entry = self
            .nodes
            .get_mut(*node)
            .ok_or(MemoryError::UnknownNode(*node))?;
        match value {
            Some(value) => {
                self.stats.attrs_set += 1;
                entry.attrs.insert(name.to_string(), value.clone());
            }
            None => {
                self.stats.attrs_removed += 1;
                entry.attrs.shift_remove(name);
            }
        }
        Ok(())
    }

    fn set_style_property(
        &mut self,
        node: &NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), MemoryError> {
        let entry = self
            .nodes
            .get_mut(*node)
            .ok_or(MemoryError::UnknownNode(*node))?;
        self.stats.style_set += 1;
        match value {
            Some(value) => {
                entry.style.insert(name.to_string(), value.to_string());
            }
            None => {
                entry.style.shift_remove(name);
            }
        }
        Ok(())
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), MemoryError> {
        let entry = self
            .nodes
            .get_mut(*node)
            .ok_or(MemoryError::UnknownNode(*node))?;
        self.stats.text_set += 1;
        match &mut entry.content {
            MemoryContent::Text(s) => *s = text.to_string(),
            MemoryContent::Element { text: slot, .. } => *slot = Some(text.to_string()),
        }
        Ok(())
    }

    fn insert_child(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        before: Option<&NodeId>,
    ) -> Result<(), MemoryError> {
        self.stats.inserted += 1;
        self.insert_at(*parent, *child, before.copied())
    }

    fn move_child(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        before: Option<&NodeId>,
    ) -> Result<(), MemoryError> {
        self.stats.moved += 1;
        self.detach(*child)?;
        self.insert_at(*parent, *child, before.copied())
    }

    fn remove_node(&mut self, node: &NodeId) -> Result<(), MemoryError> {
        self.stats.removed += 1;
        self.detach(*node)?;
        self.free_subtree(*node);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
