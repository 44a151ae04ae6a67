//! Component-local state for context components.
//!
//! Every context component mount owns a private slot map of named state
//! values. The render function reaches it through [`StateCx`]; nothing else
//! reads or writes the map between mount and unmount.

use indexmap::IndexMap;

use crate::types::Value;

/// Per-mount state storage: slot name -> value.
pub type StateMap = IndexMap<String, Value>;

/// State accessors handed to a context component's render function.
///
/// Scoped to a single mount instance: the same component mounted twice gets
/// two independent state maps.
pub struct StateCx<'a> {
    slots: &'a mut StateMap,
}

impl<'a> StateCx<'a> {
    pub(crate) fn new(slots: &'a mut StateMap) -> Self {
        Self { slots }
    }

    /// Initialize a state slot if absent and return its current value.
    ///
    /// On the first render this stores `default`; on later renders the
    /// retained value wins.
    pub fn init_state(&mut self, name: impl Into<String>, default: impl Into<Value>) -> Value {
        self.slots
            .entry(name.into())
            .or_insert_with(|| default.into())
            .clone()
    }

    /// Read a state slot.
    pub fn get_state(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Write a state slot.
    ///
    /// Takes effect on the next render; this engine does not schedule
    /// re-renders itself.
    pub fn set_state(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.slots.insert(name.into(), value.into());
    }
}
