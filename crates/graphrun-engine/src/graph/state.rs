use serde::{Deserialize, Serialize};
use serde_json::Value;

use graphrun_core::types::{StateMap, ERRORS_KEY};

/// Working memory of a run while the interpreter owns it.
///
/// Capabilities read from it and return partial mappings that are merged
/// back key by key; failures accumulate under `_errors`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunState {
    data: StateMap,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a RunState from initial data.
    pub fn from_map(data: StateMap) -> Self {
        Self { data }
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Merge a partial mapping into this state (overwrites on conflict).
    pub fn merge(&mut self, partial: StateMap) {
        for (k, v) in partial {
            self.data.insert(k, v);
        }
    }

    /// Append a failure message to the reserved error list.
    ///
    /// A non-list value already stored under the key is kept as the first entry.
    pub fn push_error(&mut self, message: impl Into<String>) {
        let message = Value::String(message.into());
        match self.data.get_mut(ERRORS_KEY) {
            Some(Value::Array(items)) => items.push(message),
            Some(other) => {
                let previous = other.take();
                *other = Value::Array(vec![previous, message]);
            }
            None => {
                self.data
                    .insert(ERRORS_KEY.to_string(), Value::Array(vec![message]));
            }
        }
    }

    /// Messages recorded under the reserved error key.
    pub fn errors(&self) -> Vec<&str> {
        self.data
            .get(ERRORS_KEY)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn data(&self) -> &StateMap {
        &self.data
    }

    pub fn into_inner(self) -> StateMap {
        self.data
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.data) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str("{}"),
        }
    }
}
