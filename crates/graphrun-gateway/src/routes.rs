use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use graphrun_core::graph::GraphDefinition;
use graphrun_core::types::{GraphId, RunId, StateMap};

use crate::state::AppState;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn not_found(detail: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail })))
}

// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "bind": state.config.bind,
    }))
}

// POST /graph/create
pub async fn create_graph(
    State(state): State<Arc<AppState>>,
    Json(definition): Json<GraphDefinition>,
) -> Json<Value> {
    let graph_id = state.engine.create_graph(definition);
    Json(json!({ "graph_id": graph_id }))
}

// GET /graph/:graph_id
pub async fn get_graph(
    State(state): State<Arc<AppState>>,
    Path(graph_id): Path<String>,
) -> ApiResult {
    let graph = state
        .engine
        .get_graph(&GraphId::from_string(&graph_id))
        .ok_or_else(|| not_found("graph not found"))?;
    Ok(Json(json!({
        "graph_id": graph_id,
        "nodes": graph.nodes,
        "edges": graph.edges,
        "entrypoint": graph.entrypoint,
        "max_steps": graph.max_steps,
    })))
}

#[derive(Deserialize)]
pub struct RunRequest {
    pub graph_id: String,
    #[serde(default)]
    pub initial_state: Option<StateMap>,
}

// POST /graph/run (execution continues after the response is sent)
pub async fn run_graph(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunRequest>,
) -> ApiResult {
    let graph_id = GraphId::from_string(&body.graph_id);
    let run_id = state
        .engine
        .start_run(&graph_id, body.initial_state.unwrap_or_default())
        .map_err(|e| {
            warn!(graph_id = %graph_id, error = %e, "Run request rejected");
            not_found("graph not found")
        })?;
    info!(run_id = %run_id, graph_id = %graph_id, "Run started via gateway");
    Ok(Json(json!({ "run_id": run_id, "status": "started" })))
}

// GET /graph/state/:run_id
pub async fn run_state(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> ApiResult {
    let run = state
        .engine
        .inspect_run(&RunId::from_string(&run_id))
        .ok_or_else(|| not_found("run not found"))?;
    Ok(Json(json!({
        "run_id": run.run_id,
        "status": run.status,
        "state": run.state,
        "log": run.log,
        "current_node": run.current_node,
        "steps": run.steps,
    })))
}

// GET /runs
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "runs": state.engine.list_runs() }))
}

// GET /tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "tools": state.engine.capabilities().names(),
        "details": state.engine.describe_capabilities(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::Request;
    use graphrun_core::config::{EngineConfig, GatewayConfig};
    use graphrun_core::types::RunStatus;
    use graphrun_engine::Engine;
    use graphrun_test_utils::{Counter, SetKey};
    use graphrun_tools::CapabilityRegistry;
    use tower::ServiceExt;

    fn app_state() -> Arc<AppState> {
        let mut registry = CapabilityRegistry::new();
        registry.register_direct(Counter::new("tick", "n"));
        registry.register_direct(SetKey::new("mark", "marked", json!(true)));
        Arc::new(AppState {
            config: GatewayConfig::default(),
            engine: Arc::new(Engine::in_memory(registry, EngineConfig::default())),
        })
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn graph_body() -> Value {
        json!({
            "nodes": {
                "count": {"name": "count", "func": "tick"},
                "done": {"name": "done", "func": "mark", "config": {}}
            },
            "edges": {
                "count": {"cond": "state['n'] >= 3", "next": "done", "else": "count"}
            },
            "entrypoint": "count"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app_state(), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["bind"], GatewayConfig::default().bind.as_str());
    }

    #[tokio::test]
    async fn test_create_and_fetch_graph() {
        let state = app_state();
        let (status, body) = send(&state, post("/graph/create", graph_body())).await;
        assert_eq!(status, StatusCode::OK);
        let graph_id = body["graph_id"].as_str().unwrap().to_string();

        let (status, body) = send(&state, get(&format!("/graph/{}", graph_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["entrypoint"], "count");
        assert_eq!(body["max_steps"], 500);
        assert_eq!(body["edges"]["count"]["else"], "count");
    }

    #[tokio::test]
    async fn test_unknown_graph_is_404() {
        let state = app_state();
        let (status, _) = send(&state, get("/graph/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&state, post("/graph/run", json!({"graph_id": "nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "graph not found");
    }

    #[tokio::test]
    async fn test_malformed_graph_rejected() {
        let (status, _) = send(
            &app_state(),
            post("/graph/create", json!({"nodes": {}, "edges": {}})),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_run_then_poll_state() {
        let state = app_state();
        let (_, body) = send(&state, post("/graph/create", graph_body())).await;
        let graph_id = body["graph_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &state,
            post("/graph/run", json!({"graph_id": graph_id, "initial_state": {"n": 0}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "started");
        let run_id = body["run_id"].as_str().unwrap().to_string();

        let uri = format!("/graph/state/{}", run_id);
        let mut last = Value::Null;
        for _ in 0..100 {
            let (status, body) = send(&state, get(&uri)).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == RunStatus::Finished.as_str() {
                last = body;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(last["state"]["n"], 3);
        assert_eq!(last["state"]["marked"], true);
        assert_eq!(last["log"][0], "starting run at count");

        let (_, body) = send(&state, get("/runs")).await;
        assert_eq!(body["runs"][0]["run_id"], run_id.as_str());
    }

    #[tokio::test]
    async fn test_unknown_run_is_404() {
        let (status, body) = send(&app_state(), get("/graph/state/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "run not found");
    }

    #[tokio::test]
    async fn test_list_tools() {
        let (status, body) = send(&app_state(), get("/tools")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tools"], json!(["mark", "tick"]));
        assert_eq!(body["details"][1]["mode"], "direct");
    }
}
