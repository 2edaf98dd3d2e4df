use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use infergate_core::readiness::EngineState;
use infergate_worker::executor::ExecutorStats;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` once the backend is ready, `initializing` before.
    pub status: &'static str,
    pub model: String,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub engine: EngineState,
    pub executor: ExecutorStats,
}

/// GET /health -- 200 when the backend is ready, 503 while it loads.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let engine = state.facade.gate().state();
    let (code, status) = if engine == EngineState::Ready {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    };

    (
        code,
        Json(HealthResponse {
            status,
            model: state.config.model.id.clone(),
            version: env!("CARGO_PKG_VERSION"),
            engine,
            executor: state.facade.executor().stats(),
        }),
    )
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
