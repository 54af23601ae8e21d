use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, warn};

use graphrun_core::graph::Graph;
use graphrun_core::traits::RunStore;
use graphrun_core::types::{GraphId, Run, RunId, RunSummary, RunUpdate, StateMap};

#[derive(Default)]
struct Inner {
    graphs: HashMap<GraphId, Arc<Graph>>,
    runs: HashMap<RunId, Run>,
    /// Run ids in creation order.
    order: Vec<RunId>,
}

/// Process-local store for graphs and runs.
///
/// One lock guards every record, so writers are serialized across all runs.
/// Readers get cloned snapshots and never see a half-applied update.
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl RunStore for MemoryStore {
    fn create_graph(&self, graph: Graph) -> GraphId {
        let graph_id = GraphId::new();
        self.write(|inner| inner.graphs.insert(graph_id.clone(), Arc::new(graph)));
        debug!(graph_id = %graph_id, "Graph stored");
        graph_id
    }

    fn get_graph(&self, graph_id: &GraphId) -> Option<Arc<Graph>> {
        self.read(|inner| inner.graphs.get(graph_id).cloned())
    }

    fn create_run(&self, graph_id: &GraphId, initial_state: StateMap) -> RunId {
        let run = Run::new(graph_id.clone(), initial_state);
        let run_id = run.run_id.clone();
        self.write(|inner| {
            inner.order.push(run_id.clone());
            inner.runs.insert(run_id.clone(), run);
        });
        debug!(run_id = %run_id, graph_id = %graph_id, "Run created");
        run_id
    }

    fn update_run(&self, run_id: &RunId, update: RunUpdate) {
        if update.is_empty() {
            return;
        }
        self.write(|inner| {
            let Some(run) = inner.runs.get_mut(run_id) else {
                return;
            };
            if let Some(status) = update.status {
                if run.status.can_transition_to(status) {
                    run.status = status;
                } else {
                    warn!(
                        run_id = %run_id,
                        from = %run.status,
                        to = %status,
                        "Ignoring non-monotonic status change"
                    );
                }
            }
            if let Some(state) = update.state {
                run.state = state;
            }
            if let Some(node) = update.current_node {
                run.current_node = Some(node);
            }
            if let Some(steps) = update.steps {
                run.steps = steps;
            }
            run.updated_at = Utc::now();
        });
    }

    fn append_log(&self, run_id: &RunId, message: String) {
        self.write(|inner| {
            if let Some(run) = inner.runs.get_mut(run_id) {
                run.log.push(message);
                run.updated_at = Utc::now();
            }
        });
    }

    fn get_run(&self, run_id: &RunId) -> Option<Run> {
        self.read(|inner| inner.runs.get(run_id).cloned())
    }

    fn list_runs(&self) -> Vec<RunSummary> {
        self.read(|inner| {
            inner
                .order
                .iter()
                .filter_map(|id| inner.runs.get(id))
                .map(Run::summary)
                .collect()
        })
    }
}
