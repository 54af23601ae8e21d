use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::graph::Graph;
use crate::types::*;

/// Capability that completes synchronously.
///
/// Receives either the full run state or the node's config (see `pass_state`)
/// and returns a partial state to merge back, or nothing.
pub trait DirectCapability: Send + Sync + 'static {
    /// Capability name (referenced by `func` in node definitions).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    fn call(&self, input: StateMap) -> Result<Option<StateMap>>;
}

/// Capability that may suspend before producing its result.
pub trait SuspendingCapability: Send + Sync + 'static {
    /// Capability name (referenced by `func` in node definitions).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    fn call(&self, input: StateMap) -> BoxFuture<'_, Result<Option<StateMap>>>;
}

/// Run store: the single source of truth for graph and run records.
///
/// Implementations serialize all mutations and hand out snapshots only;
/// callers never hold a reference into a stored record.
pub trait RunStore: Send + Sync + 'static {
    /// Store a graph under a fresh identifier.
    fn create_graph(&self, graph: Graph) -> GraphId;

    fn get_graph(&self, graph_id: &GraphId) -> Option<Arc<Graph>>;

    /// Allocate a `pending` run with a copy of `initial_state` and an empty log.
    fn create_run(&self, graph_id: &GraphId, initial_state: StateMap) -> RunId;

    /// Merge `update` into the run record atomically. No-op for unknown runs.
    fn update_run(&self, run_id: &RunId, update: RunUpdate);

    /// Append one log entry. No-op for unknown runs.
    fn append_log(&self, run_id: &RunId, message: String);

    /// Snapshot of the run record.
    fn get_run(&self, run_id: &RunId) -> Option<Run>;

    /// Summaries of all runs, oldest first.
    fn list_runs(&self) -> Vec<RunSummary>;
}
