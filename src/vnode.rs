//! VNode model - the immutable description of one tree position.
//!
//! A `VNode` describes the desired state of a single position in the host
//! tree: a text run, an element with attributes/style/children, or a
//! component instance. VNodes are values: "updating" a node always means
//! reconciling an old VNode against a new one, never mutating in place.
//!
//! Identity facets (key, type tag, skip flag) are independent of shape and
//! live on the node itself, so the reconciler can consult them without
//! matching on the shape first.

use bitflags::bitflags;

use crate::types::{AttrMap, Key, Props, StyleMap, Value};

// =============================================================================
// Flags
// =============================================================================

bitflags! {
    /// Per-node flags, independent of node shape.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Marks an auxiliary overlay (decorator) subtree. When a
        /// synchronization call runs with `exclude_marked`, subtrees rooted
        /// at a flagged node are not visited at all - they belong to a
        /// separate, independently scheduled renderer.
        const SKIP = 1 << 0;
    }
}

// =============================================================================
// Shape data
// =============================================================================

/// Payload of an element VNode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    /// Tag name. May be namespace-qualified; resolution is the adapter's job.
    pub tag: String,
    /// Namespace override for this element and its subtree. `None` inherits
    /// the ambient namespace from the reconcile context.
    pub namespace: Option<String>,
    /// Attribute name -> value.
    pub attrs: AttrMap,
    /// Style property -> value.
    pub style: StyleMap,
    /// Direct text payload, for elements whose content is a single text run.
    pub text: Option<String>,
    /// Ordered child VNodes.
    pub children: Vec<VNode>,
}

/// Payload of a component VNode.
///
/// There is no retained-instance slot here: the mounted instance is owned by
/// the lifecycle manager's mount arena, keeping the VNode a pure value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentData {
    /// Component reference, resolved through the registry at mount time.
    pub reference: String,
    /// Prop name -> value.
    pub props: Props,
    /// Declared children, reconciled beneath the mounted node unless the
    /// component claims exclusive subtree ownership.
    pub children: Vec<VNode>,
}

/// The shape of a VNode - exactly one of three.
#[derive(Debug, Clone, PartialEq)]
pub enum VShape {
    /// A text run.
    Text(String),
    /// An element with attributes, style and children.
    Element(ElementData),
    /// A component instance.
    Component(ComponentData),
}

/// Coarse node kind, used for compatibility checks and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Text shape.
    Text,
    /// Element shape.
    Element,
    /// Component shape.
    Component,
}

impl NodeKind {
    /// Lowercase name for log/diagnostic output.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Text => "text",
            NodeKind::Element => "element",
            NodeKind::Component => "component",
        }
    }
}

// =============================================================================
// VNode
// =============================================================================

/// Immutable description of the desired state at one tree position.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    /// The node's shape: text, element or component.
    pub shape: VShape,
    /// Stable identity for keyed child matching.
    pub key: Option<Key>,
    /// Logical-type tag. Nodes with different type tags are incompatible
    /// regardless of shape similarity.
    pub type_tag: Option<String>,
    /// Shape-independent flags.
    pub flags: NodeFlags,
}

impl VNode {
    /// Create a text node.
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_shape(VShape::Text(content.into()))
    }

    /// Create an element node with no attributes or children.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::with_shape(VShape::Element(ElementData {
            tag: tag.into(),
            ..ElementData::default()
        }))
    }

    /// Create a component node.
    pub fn component(reference: impl Into<String>) -> Self {
        Self::with_shape(VShape::Component(ComponentData {
            reference: reference.into(),
            ..ComponentData::default()
        }))
    }

    fn with_shape(shape: VShape) -> Self {
        Self {
            shape,
            key: None,
            type_tag: None,
            flags: NodeFlags::empty(),
        }
    }

    // =========================================================================
    // Identity facets
    // =========================================================================

    /// Attach a sibling-matching key.
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach a logical-type tag.
    pub fn with_type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }

    /// Mark this node as an overlay (decorator) subtree root.
    pub fn skipped(mut self) -> Self {
        self.flags |= NodeFlags::SKIP;
        self
    }

    /// Whether this node carries the overlay skip flag.
    pub fn is_skipped(&self) -> bool {
        self.flags.contains(NodeFlags::SKIP)
    }

    // =========================================================================
    // Element builders
    // =========================================================================

    /// Set an attribute. No-op on non-element nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let VShape::Element(el) = &mut self.shape {
            el.attrs.insert(name.into(), value.into());
        }
        self
    }

    /// Set a style property. No-op on non-element nodes.
    pub fn style_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let VShape::Element(el) = &mut self.shape {
            el.style.insert(name.into(), value.into());
        }
        self
    }

    /// Set the direct text payload. No-op on non-element nodes.
    pub fn text_content(mut self, text: impl Into<String>) -> Self {
        if let VShape::Element(el) = &mut self.shape {
            el.text = Some(text.into());
        }
        self
    }

    /// Set the namespace override for this element's subtree.
    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        if let VShape::Element(el) = &mut self.shape {
            el.namespace = Some(ns.into());
        }
        self
    }

    /// Append a child. Works on elements and components.
    pub fn child(mut self, node: VNode) -> Self {
        match &mut self.shape {
            VShape::Element(el) => el.children.push(node),
            VShape::Component(c) => c.children.push(node),
            VShape::Text(_) => {}
        }
        self
    }

    /// Append several children. Works on elements and components.
    pub fn children(mut self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        match &mut self.shape {
            VShape::Element(el) => el.children.extend(nodes),
            VShape::Component(c) => c.children.extend(nodes),
            VShape::Text(_) => {}
        }
        self
    }

    // =========================================================================
    // Component builders
    // =========================================================================

    /// Set a prop. No-op on non-component nodes.
    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        if let VShape::Component(c) = &mut self.shape {
            c.props.insert(name.into(), value.into());
        }
        self
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Coarse kind of this node.
    pub fn kind(&self) -> NodeKind {
        match &self.shape {
            VShape::Text(_) => NodeKind::Text,
            VShape::Element(_) => NodeKind::Element,
            VShape::Component(_) => NodeKind::Component,
        }
    }

    /// Tag name (elements) or component reference, if any.
    pub fn name(&self) -> Option<&str> {
        match &self.shape {
            VShape::Text(_) => None,
            VShape::Element(el) => Some(&el.tag),
            VShape::Component(c) => Some(&c.reference),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
