use std::sync::Arc;

use serde_json::json;

use graphrun_core::config::EngineConfig;
use graphrun_core::graph::GraphDefinition;
use graphrun_core::types::{RunStatus, StateMap};
use graphrun_engine::Engine;
use graphrun_store::MemoryStore;
use graphrun_test_utils::state;
use graphrun_tools::CapabilityRegistry;

fn engine() -> Engine {
    Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(CapabilityRegistry::with_builtins()),
        EngineConfig::default(),
    )
}

fn parse(definition: serde_json::Value) -> GraphDefinition {
    serde_json::from_value(definition).expect("valid graph definition")
}

fn review_pipeline() -> GraphDefinition {
    parse(json!({
        "nodes": {
            "smells": {"name": "Detect smells", "func": "detect_smells"},
            "complexity": {"name": "Complexity", "func": "compute_complexity"},
            "suggest": {"name": "Suggest", "func": "suggest_improvement"}
        },
        "edges": {
            "smells": "complexity",
            "complexity": [
                {"cond": "state['issues'] > 0 or state['complexity_score'] > 3", "next": "suggest"}
            ]
        },
        "entrypoint": "smells"
    }))
}

#[tokio::test]
async fn test_review_pipeline_suggests_fixes() {
    let engine = engine();
    let graph_id = engine.create_graph(review_pipeline());
    let code = "def f(x):\n    # TODO tidy\n    if x:\n        for i in x:\n            if i:\n                while i:\n                    i -= 1\n";

    let run = engine
        .run_to_completion(&graph_id, state(json!({ "code": code })))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.state["issues"], json!(1));
    assert_eq!(run.state["complexity_score"], json!(4));
    assert_eq!(
        run.state["suggestions"],
        json!([
            "Address TODOs and long lines.",
            "Refactor large functions into smaller ones."
        ])
    );
    assert!(run.errors().is_empty());
    assert_eq!(run.log.last().map(String::as_str), Some("run finished"));
}

#[tokio::test]
async fn test_clean_code_stops_after_complexity() {
    let engine = engine();
    let graph_id = engine.create_graph(review_pipeline());

    let run = engine
        .run_to_completion(&graph_id, state(json!({ "code": "x = 1\n" })))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.steps, 2);
    assert!(run.state.get("suggestions").is_none());
    assert!(run
        .log
        .iter()
        .any(|l| l == "no next node -> stopping at complexity"));
}

#[tokio::test]
async fn test_missing_input_is_recorded_and_run_continues() {
    let engine = engine();
    let graph_id = engine.create_graph(review_pipeline());

    let run = engine
        .run_to_completion(&graph_id, StateMap::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.errors().len(), 2);
    assert_eq!(run.steps, 2);
}

#[tokio::test(start_paused = true)]
async fn test_suspending_builtin_with_config_input() {
    let engine = engine();
    let graph_id = engine.create_graph(parse(json!({
        "nodes": {
            "check": {
                "name": "check",
                "func": "long_running_check",
                "config": {"pass_state": false, "delay_ms": 50}
            }
        },
        "edges": {"check": {"cond": "not state['checked']", "next": "check"}},
        "entrypoint": "check"
    })));

    let run = engine
        .run_to_completion(&graph_id, state(json!({"delay_ms": "not a number"})))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Finished);
    assert_eq!(run.state["checked"], json!(true));
    assert!(run.errors().is_empty());
}

#[tokio::test]
async fn test_runaway_loop_fails_at_budget() {
    let engine = engine();
    let graph_id = engine.create_graph(parse(json!({
        "nodes": {"spin": {"name": "spin", "func": "suggest_improvement"}},
        "edges": {"spin": {"cond": "True", "next": "spin"}},
        "entrypoint": "spin",
        "max_steps": 5
    })));

    let run = engine
        .run_to_completion(&graph_id, StateMap::new())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.steps, 5);
    assert_eq!(
        run.log.last().map(String::as_str),
        Some("max steps reached; possible infinite loop")
    );
}

#[tokio::test]
async fn test_unknown_capability_errors_run() {
    let engine = engine();
    let graph_id = engine.create_graph(parse(json!({
        "nodes": {"a": {"name": "a", "func": "does_not_exist"}},
        "edges": {},
        "entrypoint": "a"
    })));

    let run = engine
        .run_to_completion(&graph_id, StateMap::new())
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Error);
    assert_eq!(engine.list_runs()[0].status, RunStatus::Error);
}
