//! Graph interpreter: walks a stored graph one node at a time.
//!
//! A workflow is a set of named nodes, each bound to a registered capability,
//! connected by edges that are either unconditional or guarded by conditions
//! over the run state. The `GraphExecutor` starts at the entrypoint, invokes
//! each node's capability, merges its output into the shared state, and
//! follows the first matching edge until no edge applies or the step budget
//! runs out.

pub mod condition;
pub mod edge;
pub mod executor;
pub mod invoke;
pub mod state;

pub use condition::{evaluate_condition, Condition, ConditionError};
pub use edge::{resolve_edge, StopReason, Transition};
pub use executor::GraphExecutor;
pub use invoke::{invoke_node, InvocationOutcome};
pub use state::RunState;
