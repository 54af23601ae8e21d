//! Reusable capabilities and fixtures for graphrun tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use graphrun_core::error::{GraphrunError, Result};
use graphrun_core::graph::NodeDef;
use graphrun_core::traits::{DirectCapability, SuspendingCapability};
use graphrun_core::types::StateMap;

/// Build a state mapping from a JSON object literal.
///
/// Panics if `value` is not an object.
pub fn state(value: Value) -> StateMap {
    match value {
        Value::Object(map) => map,
        other => panic!("state fixture must be a JSON object, got {}", other),
    }
}

/// Node whose display name equals its capability name.
pub fn node(func: &str) -> NodeDef {
    NodeDef::new(func, func)
}

/// Writes a fixed value under a fixed key.
pub struct SetKey {
    name: String,
    key: String,
    value: Value,
}

impl SetKey {
    pub fn new(name: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value,
        }
    }
}

impl DirectCapability for SetKey {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, _input: StateMap) -> Result<Option<StateMap>> {
        let mut out = StateMap::new();
        out.insert(self.key.clone(), self.value.clone());
        Ok(Some(out))
    }
}

/// Increments an integer key (missing counts as 0).
pub struct Counter {
    name: String,
    key: String,
}

impl Counter {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

impl DirectCapability for Counter {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, input: StateMap) -> Result<Option<StateMap>> {
        let n = input.get(&self.key).and_then(Value::as_i64).unwrap_or(0);
        let mut out = StateMap::new();
        out.insert(self.key.clone(), json!(n + 1));
        Ok(Some(out))
    }
}

/// Always fails with the given message.
pub struct Failing {
    name: String,
    message: String,
}

impl Failing {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl DirectCapability for Failing {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, _input: StateMap) -> Result<Option<StateMap>> {
        Err(GraphrunError::invocation(self.message.clone()))
    }
}

/// Panics with the given message.
pub struct Panicking {
    name: String,
    message: String,
}

impl Panicking {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl DirectCapability for Panicking {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, _input: StateMap) -> Result<Option<StateMap>> {
        panic!("{}", self.message)
    }
}

/// Records every input it receives and returns nothing.
pub struct Recorder {
    name: String,
    seen: Arc<Mutex<Vec<StateMap>>>,
}

impl Recorder {
    /// Returns the capability and a handle to the inputs it will see.
    pub fn new(name: impl Into<String>) -> (Self, Arc<Mutex<Vec<StateMap>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name: name.into(),
                seen: seen.clone(),
            },
            seen,
        )
    }
}

impl DirectCapability for Recorder {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, input: StateMap) -> Result<Option<StateMap>> {
        self.seen.lock().unwrap().push(input);
        Ok(None)
    }
}

/// Sleeps, then sets `key` to `true`. Fails instead when `fail` is set.
pub struct Sleeper {
    name: String,
    key: String,
    delay: Duration,
    fail: Option<String>,
}

impl Sleeper {
    pub fn new(name: impl Into<String>, key: impl Into<String>, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            delay: Duration::from_millis(delay_ms),
            fail: None,
        }
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail = Some(message.into());
        self
    }
}

impl SuspendingCapability for Sleeper {
    fn name(&self) -> &str {
        &self.name
    }
    fn call(&self, _input: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            if let Some(message) = &self.fail {
                return Err(GraphrunError::invocation(message.clone()));
            }
            let mut out = StateMap::new();
            out.insert(self.key.clone(), json!(true));
            Ok(Some(out))
        })
    }
}
