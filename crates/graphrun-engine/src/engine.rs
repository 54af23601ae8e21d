use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use graphrun_core::config::EngineConfig;
use graphrun_core::error::{GraphrunError, Result};
use graphrun_core::graph::{Graph, GraphDefinition};
use graphrun_core::traits::RunStore;
use graphrun_core::types::{GraphId, Run, RunId, RunStatus, RunSummary, StateMap};
use graphrun_store::MemoryStore;
use graphrun_tools::{CapabilityInfo, CapabilityRegistry};

use crate::graph::GraphExecutor;

/// Entry point shared by the CLI and the HTTP gateway.
///
/// Owns the store, the capability registry, and an executor bound to both.
/// Runs started here execute on background tasks; their progress is observed
/// through the store.
pub struct Engine {
    store: Arc<dyn RunStore>,
    registry: Arc<CapabilityRegistry>,
    executor: Arc<GraphExecutor>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn RunStore>,
        registry: Arc<CapabilityRegistry>,
        config: EngineConfig,
    ) -> Self {
        let executor = Arc::new(GraphExecutor::new(store.clone(), registry.clone()));
        Self {
            store,
            registry,
            executor,
            config,
        }
    }

    /// Engine backed by a fresh in-memory store.
    pub fn in_memory(registry: CapabilityRegistry, config: EngineConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(registry), config)
    }

    /// Store a graph definition. The definition is not validated beyond parsing.
    pub fn create_graph(&self, definition: GraphDefinition) -> GraphId {
        let graph = definition.into_graph(self.config.default_max_steps);
        let graph_id = self.store.create_graph(graph);
        info!(graph_id = %graph_id, "Graph created");
        graph_id
    }

    pub fn get_graph(&self, graph_id: &GraphId) -> Option<Arc<Graph>> {
        self.store.get_graph(graph_id)
    }

    /// Create a pending run and execute it in the background.
    ///
    /// Returns as soon as the run record exists.
    pub fn start_run(&self, graph_id: &GraphId, initial_state: StateMap) -> Result<RunId> {
        let (run_id, _handle) = self.spawn_run(graph_id, initial_state)?;
        Ok(run_id)
    }

    /// Like [`Engine::start_run`], but hands back the task driving the run.
    pub fn spawn_run(
        &self,
        graph_id: &GraphId,
        initial_state: StateMap,
    ) -> Result<(RunId, JoinHandle<Result<RunStatus>>)> {
        let run_id = self.create_run(graph_id, initial_state)?;

        let executor = self.executor.clone();
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let result = executor.execute(&task_run_id).await;
            if let Err(e) = &result {
                error!(run_id = %task_run_id, error = %e, "Run execution failed");
            }
            result
        });
        Ok((run_id, handle))
    }

    /// Create a run and drive it to a terminal status on the current task.
    pub async fn run_to_completion(
        &self,
        graph_id: &GraphId,
        initial_state: StateMap,
    ) -> Result<Run> {
        let run_id = self.create_run(graph_id, initial_state)?;
        self.executor.execute(&run_id).await?;
        self.inspect_run(&run_id)
            .ok_or_else(|| GraphrunError::RunNotFound(run_id.to_string()))
    }

    /// Snapshot of a run as last persisted.
    pub fn inspect_run(&self, run_id: &RunId) -> Option<Run> {
        self.store.get_run(run_id)
    }

    pub fn list_runs(&self) -> Vec<RunSummary> {
        self.store.list_runs()
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn describe_capabilities(&self) -> Vec<CapabilityInfo> {
        self.registry.describe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn create_run(&self, graph_id: &GraphId, initial_state: StateMap) -> Result<RunId> {
        if self.store.get_graph(graph_id).is_none() {
            return Err(GraphrunError::GraphNotFound(graph_id.to_string()));
        }
        let run_id = self.store.create_run(graph_id, initial_state);
        info!(run_id = %run_id, graph_id = %graph_id, "Run created");
        Ok(run_id)
    }
}
