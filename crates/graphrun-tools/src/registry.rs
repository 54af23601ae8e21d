use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::debug;

use graphrun_core::error::Result;
use graphrun_core::traits::{DirectCapability, SuspendingCapability};
use graphrun_core::types::StateMap;

/// How a capability produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityMode {
    /// Called inline; returns immediately.
    Direct,
    /// Returns a future that the caller awaits.
    Suspending,
}

/// A registered capability, tagged with its declared invocation mode.
#[derive(Clone)]
pub enum Capability {
    Direct(Arc<dyn DirectCapability>),
    Suspending(Arc<dyn SuspendingCapability>),
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Self::Direct(c) => c.name(),
            Self::Suspending(c) => c.name(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Direct(c) => c.description(),
            Self::Suspending(c) => c.description(),
        }
    }

    pub fn mode(&self) -> CapabilityMode {
        match self {
            Self::Direct(_) => CapabilityMode::Direct,
            Self::Suspending(_) => CapabilityMode::Suspending,
        }
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name())
            .field("mode", &self.mode())
            .finish()
    }
}

/// Introspection entry for a registered capability.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
    pub mode: CapabilityMode,
}

/// Registry of available capabilities, keyed by name.
///
/// Populated at startup and shared read-only afterwards. Registering an
/// existing name replaces the earlier entry.
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Capability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a synchronous capability.
    pub fn register_direct(&mut self, capability: impl DirectCapability) {
        self.insert(Capability::Direct(Arc::new(capability)));
    }

    /// Register a capability that suspends.
    pub fn register_suspending(&mut self, capability: impl SuspendingCapability) {
        self.insert(Capability::Suspending(Arc::new(capability)));
    }

    fn insert(&mut self, capability: Capability) {
        let name = capability.name().to_string();
        debug!(capability = %name, mode = ?capability.mode(), "Registering capability");
        if self.capabilities.insert(name.clone(), capability).is_some() {
            debug!(capability = %name, "Replaced existing capability");
        }
    }

    /// Register a plain closure as a synchronous capability.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(StateMap) -> Result<Option<StateMap>> + Send + Sync + 'static,
    {
        self.register_direct(FnCapability {
            name: name.into(),
            f,
        });
    }

    /// Register a closure returning a future as a suspending capability.
    pub fn register_async_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(StateMap) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<StateMap>>> + Send + 'static,
    {
        self.register_suspending(AsyncFnCapability {
            name: name.into(),
            f,
        });
    }

    /// Resolve a capability by name.
    pub fn resolve(&self, name: &str) -> Option<Capability> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Name, description and mode of every capability, sorted by name.
    pub fn describe(&self) -> Vec<CapabilityInfo> {
        let mut infos: Vec<CapabilityInfo> = self
            .capabilities
            .values()
            .map(|c| CapabilityInfo {
                name: c.name().to_string(),
                description: c.description().to_string(),
                mode: c.mode(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Create a registry with all built-in capabilities registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // ── Code review ─────────────────────────────────────────
        registry.register_direct(crate::builtin::review::DetectSmells);
        registry.register_direct(crate::builtin::review::ComputeComplexity);
        registry.register_direct(crate::builtin::review::SuggestImprovement);

        // ── Checks ──────────────────────────────────────────────
        registry.register_suspending(crate::builtin::checks::LongRunningCheck);

        registry
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct FnCapability<F> {
    name: String,
    f: F,
}

impl<F> DirectCapability for FnCapability<F>
where
    F: Fn(StateMap) -> Result<Option<StateMap>> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, input: StateMap) -> Result<Option<StateMap>> {
        (self.f)(input)
    }
}

struct AsyncFnCapability<F> {
    name: String,
    f: F,
}

impl<F, Fut> SuspendingCapability for AsyncFnCapability<F>
where
    F: Fn(StateMap) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<StateMap>>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, input: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>> {
        Box::pin((self.f)(input))
    }
}
