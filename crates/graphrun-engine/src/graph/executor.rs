use std::sync::Arc;

use tracing::{debug, info, warn};

use graphrun_core::error::{GraphrunError, Result};
use graphrun_core::traits::RunStore;
use graphrun_core::types::{RunId, RunStatus, RunUpdate};
use graphrun_tools::CapabilityRegistry;

use super::edge::{resolve_edge, StopReason, Transition};
use super::invoke::{invoke_node, InvocationOutcome};
use super::state::RunState;

/// Drives one run through its graph, one node at a time.
///
/// Every read and write of run records goes through the store. The working
/// state is persisted after each step, so observers always see the result of
/// the last completed step. Structural failures (missing graph, node, or
/// capability) end the run with `error`; exhausting `max_steps` ends it with
/// `failed`; any other stop is `finished`.
pub struct GraphExecutor {
    store: Arc<dyn RunStore>,
    registry: Arc<CapabilityRegistry>,
}

impl GraphExecutor {
    pub fn new(store: Arc<dyn RunStore>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { store, registry }
    }

    /// Execute a pending run to a terminal status.
    ///
    /// Only an unknown `run_id` is an `Err`; every other failure is reported
    /// through the run's status and log.
    pub async fn execute(&self, run_id: &RunId) -> Result<RunStatus> {
        let run = self
            .store
            .get_run(run_id)
            .ok_or_else(|| GraphrunError::RunNotFound(run_id.to_string()))?;

        if run.status != RunStatus::Pending {
            warn!(run_id = %run_id, status = %run.status, "Run already started, not executing again");
            return Ok(run.status);
        }

        let Some(graph) = self.store.get_graph(&run.graph_id) else {
            warn!(run_id = %run_id, graph_id = %run.graph_id, "Graph not found");
            return Ok(self.terminate(run_id, RunStatus::Error, "graph not found"));
        };

        let mut state = RunState::from_map(run.state);
        let mut current = graph.entrypoint.clone();
        let mut steps = 0usize;

        self.store.update_run(run_id, RunUpdate::status(RunStatus::Running));
        self.log(run_id, format!("starting run at {}", current));
        info!(run_id = %run_id, entry = %current, max_steps = graph.max_steps, "Run started");

        let status = loop {
            if steps >= graph.max_steps {
                warn!(run_id = %run_id, steps, node = %current, "Step budget exhausted");
                self.log(run_id, "max steps reached; possible infinite loop");
                break RunStatus::Failed;
            }
            steps += 1;
            self.store.update_run(
                run_id,
                RunUpdate::default()
                    .with_current_node(current.as_str())
                    .with_steps(steps),
            );

            let Some(node) = graph.node(&current) else {
                warn!(run_id = %run_id, node = %current, "Node not found");
                self.log(run_id, format!("node '{}' not found; stopping", current));
                break RunStatus::Error;
            };

            self.log(run_id, format!("running node: {}", current));
            let Some(capability) = self.registry.resolve(&node.func) else {
                warn!(run_id = %run_id, node = %current, func = %node.func, "Capability not found");
                self.log(
                    run_id,
                    format!(
                        "function '{}' not found for node '{}'; stopping",
                        node.func, current
                    ),
                );
                break RunStatus::Error;
            };

            debug!(run_id = %run_id, node = %current, step = steps, mode = ?capability.mode(), "Executing graph node");
            match invoke_node(&capability, node, &mut state).await {
                InvocationOutcome::Failed(message) => {
                    warn!(run_id = %run_id, node = %current, error = %message, "Capability failed, continuing");
                }
                outcome => {
                    debug!(run_id = %run_id, node = %current, ?outcome, "Node execution complete");
                }
            }

            self.log(run_id, format!("state after {}: {}", current, state));
            self.store
                .update_run(run_id, RunUpdate::state(state.data().clone()));

            match resolve_edge(graph.edge(&current), state.data()) {
                Transition::Next(next) => {
                    debug!(run_id = %run_id, from = %current, to = %next, "Following edge");
                    current = next;
                }
                Transition::Stop(reason) => {
                    if reason == StopReason::NoEdge {
                        self.log(run_id, format!("no edge from {}; finishing", current));
                    }
                    self.log(run_id, format!("no next node -> stopping at {}", current));
                    break RunStatus::Finished;
                }
            }
        };

        if status == RunStatus::Finished {
            self.log(run_id, "run finished");
        }
        self.store.update_run(run_id, RunUpdate::status(status));
        info!(run_id = %run_id, %status, steps, "Run complete");
        Ok(status)
    }

    fn log(&self, run_id: &RunId, message: impl Into<String>) {
        self.store.append_log(run_id, message.into());
    }

    fn terminate(&self, run_id: &RunId, status: RunStatus, message: &str) -> RunStatus {
        self.log(run_id, message);
        self.store.update_run(run_id, RunUpdate::status(status));
        status
    }
}
