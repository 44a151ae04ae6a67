//! Attribute and style diffing.
//!
//! Pure functions that compare the attribute/style maps of two element
//! VNodes and yield the operations needed to bring the host node in line.
//! Cost is bounded by the attribute set size, never by subtree size.
//!
//! Rules:
//! - Walk the union of names on both sides.
//! - Apply when the value differs; remove when the next value is absent or
//!   explicitly null.
//! - Event-handler-shaped values are never diffed: a handler on the next
//!   side is always a remove-then-install, so stale closures can't survive
//!   an update.

use crate::types::{AttrMap, StyleMap, Value};

/// One attribute mutation. `value: None` removes the attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrOp<'a> {
    /// Attribute name.
    pub name: &'a str,
    /// New value, or `None` to remove.
    pub value: Option<&'a Value>,
}

/// One style-property mutation. `value: None` removes the property.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOp<'a> {
    /// Style property name.
    pub name: &'a str,
    /// New value, or `None` to remove.
    pub value: Option<&'a str>,
}

fn effective(value: Option<&Value>) -> Option<&Value> {
    match value {
        Some(Value::Null) | None => None,
        Some(v) => Some(v),
    }
}

/// Diff two attribute maps into the operations bringing `prev` to `next`.
pub fn diff_attrs<'a>(prev: &'a AttrMap, next: &'a AttrMap) -> Vec<AttrOp<'a>> {
    let mut ops = Vec::new();

    for (name, next_value) in next {
        let prev_value = effective(prev.get(name));
        match effective(Some(next_value)) {
            Some(value) if value.is_handler() => {
                // Handlers are replaced wholesale, never compared by value.
                if prev_value.is_some() {
                    ops.push(AttrOp { name, value: None });
                }
                ops.push(AttrOp {
                    name,
                    value: Some(value),
                });
            }
            Some(value) => {
                if prev_value != Some(value) {
                    ops.push(AttrOp {
                        name,
                        value: Some(value),
                    });
                }
            }
            None => {
                // Present on the next side but null: remove if it existed.
                if prev_value.is_some() {
                    ops.push(AttrOp { name, value: None });
                }
            }
        }
    }

    // Names only present on the previous side are removed.
    for name in prev.keys() {
        if !next.contains_key(name) && effective(prev.get(name)).is_some() {
            ops.push(AttrOp { name, value: None });
        }
    }

    ops
}

/// Diff two style maps into the operations bringing `prev` to `next`.
pub fn diff_style<'a>(prev: &'a StyleMap, next: &'a StyleMap) -> Vec<StyleOp<'a>> {
    let mut ops = Vec::new();

    for (name, next_value) in next {
        if prev.get(name) != Some(next_value) {
            ops.push(StyleOp {
                name,
                value: Some(next_value),
            });
        }
    }
    for name in prev.keys() {
        if !next.contains_key(name) {
            ops.push(StyleOp { name, value: None });
        }
    }

    ops
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handler;

    fn attrs(pairs: &[(&str, Value)]) -> AttrMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unchanged_is_empty() {
        let prev = attrs(&[("class", Value::Str("x".into()))]);
        let next = prev.clone();
        assert!(diff_attrs(&prev, &next).is_empty());
    }

    #[test]
    fn test_changed_and_removed() {
        let prev = attrs(&[
            ("class", Value::Str("x".into())),
            ("title", Value::Str("t".into())),
        ]);
        let next = attrs(&[("class", Value::Str("y".into()))]);

        let ops = diff_attrs(&prev, &next);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "class");
        assert_eq!(ops[0].value, Some(&Value::Str("y".into())));
        assert_eq!(ops[1].name, "title");
        assert_eq!(ops[1].value, None);
    }

    #[test]
    fn test_null_means_remove() {
        let prev = attrs(&[("hidden", Value::Bool(true))]);
        let next = attrs(&[("hidden", Value::Null)]);
        let ops = diff_attrs(&prev, &next);
        assert_eq!(ops, vec![AttrOp { name: "hidden", value: None }]);

        // Null on both sides: nothing to do.
        let prev = attrs(&[("hidden", Value::Null)]);
        assert!(diff_attrs(&prev, &next).is_empty());
    }

    #[test]
    fn test_handler_always_replaced() {
        let handler = Handler::new(|_| {});
        let prev = attrs(&[("onclick", Value::Handler(handler.clone()))]);
        // Same handler identity on both sides still reinstalls.
        let next = attrs(&[("onclick", Value::Handler(handler))]);

        let ops = diff_attrs(&prev, &next);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].value, None);
        assert!(ops[1].value.is_some());
    }

    #[test]
    fn test_fresh_handler_installs_without_remove() {
        let prev = AttrMap::new();
        let next = attrs(&[("onclick", Value::Handler(Handler::new(|_| {})))]);
        let ops = diff_attrs(&prev, &next);
        assert_eq!(ops.len(), 1);
        assert!(ops[0].value.is_some());
    }

    #[test]
    fn test_style_diff() {
        let prev: StyleMap = [("color", "red"), ("margin", "1px")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let next: StyleMap = [("color", "blue")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let ops = diff_style(&prev, &next);
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], StyleOp { name: "color", value: Some("blue") });
        assert_eq!(ops[1], StyleOp { name: "margin", value: None });
    }
}
