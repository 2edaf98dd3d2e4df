//! Handler for the OpenAI-compatible chat completions endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use infergate_core::completion::CompletionRequest;

use crate::error::AppResult;
use crate::response::ChatCompletionResponse;
use crate::state::AppState;

/// POST /v1/chat/completions
///
/// Missing `model`, `max_tokens`, `temperature` and `top_p` fall back to the
/// configured model alias, 150, 0.7 and 1.0.
pub async fn create_chat_completion(
    State(state): State<AppState>,
    payload: Result<Json<CompletionRequest>, JsonRejection>,
) -> AppResult<Json<ChatCompletionResponse>> {
    let Json(request) = payload?;
    let done = state.facade.complete(request).await?;

    tracing::info!(
        job_id = %done.job_id,
        model = %done.model,
        completion_tokens = done.output.completion_tokens,
        "Chat completion finished",
    );
    Ok(Json(done.into()))
}
