use std::sync::Arc;

use graphrun_core::config::GatewayConfig;
use graphrun_engine::Engine;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub engine: Arc<Engine>,
}
