pub mod engine;
pub mod graph;

pub use engine::Engine;
pub use graph::{evaluate_condition, Condition, ConditionError, GraphExecutor, RunState};
