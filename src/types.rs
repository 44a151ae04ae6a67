//! Core value types for vtree.
//!
//! These types flow through the whole engine: keys identify children across
//! renders, and `Value` is the payload type for attributes and component props.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

// =============================================================================
// Key
// =============================================================================

/// Application-supplied stable identity for keyed child matching.
///
/// Keys are only ever used to match children across renders - they carry no
/// other meaning. Keys must be unique among siblings; duplicates are reported
/// through the diagnostics sink and demoted to positional matching.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Integer key (e.g. a database id).
    Int(i64),
    /// String key.
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

// =============================================================================
// Handler
// =============================================================================

/// An event-handler attribute value.
///
/// Handlers are opaque callbacks compared by pointer identity, never by value.
/// The attribute differ always replaces handlers (remove old, install new)
/// instead of diffing them.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&dyn Any)>);

impl Handler {
    /// Wrap a callback as a handler value.
    pub fn new(f: impl Fn(&dyn Any) + 'static) -> Self {
        Handler(Rc::new(f))
    }

    /// Invoke the handler with an opaque event payload.
    pub fn call(&self, event: &dyn Any) {
        (self.0)(event)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Value
// =============================================================================

/// Attribute and prop payload.
///
/// Late-binding (signals, getters, template expressions) is resolved before a
/// value reaches this engine - by the time a `Value` is here it is plain data,
/// except for `Handler` which stays opaque.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicit null (distinct from an absent attribute).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
    /// Event handler (replaced, never diffed).
    Handler(Handler),
}

impl Value {
    /// Check whether this value is event-handler-shaped.
    pub fn is_handler(&self) -> bool {
        matches!(self, Value::Handler(_))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Handler> for Value {
    fn from(value: Handler) -> Self {
        Value::Handler(value)
    }
}

// =============================================================================
// Map aliases
// =============================================================================

/// Attribute map: attribute name -> value, in declaration order.
///
/// Insertion-ordered so that diffs walk attributes deterministically.
pub type AttrMap = IndexMap<String, Value>;

/// Style map: style property -> value, in declaration order.
pub type StyleMap = IndexMap<String, String>;

/// Component props: prop name -> value, in declaration order.
pub type Props = IndexMap<String, Value>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality() {
        assert_eq!(Key::from(1), Key::Int(1));
        assert_eq!(Key::from("a"), Key::Str("a".to_string()));
        assert_ne!(Key::Int(1), Key::Str("1".to_string()));
    }

    #[test]
    fn test_handler_identity() {
        let a = Handler::new(|_| {});
        let b = a.clone();
        let c = Handler::new(|_| {});

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_value_is_handler() {
        assert!(Value::Handler(Handler::new(|_| {})).is_handler());
        assert!(!Value::Str("click".into()).is_handler());
    }
}
