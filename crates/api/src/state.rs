use std::sync::Arc;

use infergate_worker::facade::InferenceFacade;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Readiness gate, executor and supervisor behind one entry point.
    pub facade: Arc<InferenceFacade>,
}
