use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use graphrun_core::config::GatewayConfig;
use graphrun_engine::Engine;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway server built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    engine: Arc<Engine>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, engine: Arc<Engine>) -> Self {
        Self { config, engine }
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let state = Arc::new(AppState {
            config: self.config.clone(),
            engine: self.engine.clone(),
        });
        let app = router(state);

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}

/// Build the application router over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        // Graphs
        .route("/graph/create", post(routes::create_graph))
        .route("/graph/run", post(routes::run_graph))
        .route("/graph/state/{run_id}", get(routes::run_state))
        .route("/graph/{graph_id}", get(routes::get_graph))
        // Introspection
        .route("/runs", get(routes::list_runs))
        .route("/tools", get(routes::list_tools))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
