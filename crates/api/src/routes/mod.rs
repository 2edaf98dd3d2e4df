pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the OpenAI-compatible route tree.
///
/// ```text
/// /v1/models                  list served models (GET)
/// /v1/chat/completions        chat completion (POST)
/// ```
pub fn openai_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/models", get(handlers::models::list_models))
        .route(
            "/v1/chat/completions",
            post(handlers::completions::create_chat_completion),
        )
}

/// Build the media route tree.
///
/// ```text
/// /sync                       lip-sync video to audio (POST, multipart)
/// /tts                        text to speech (POST)
/// ```
pub fn media_routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(handlers::media::sync_media))
        .route("/tts", post(handlers::media::synthesize_speech))
}
