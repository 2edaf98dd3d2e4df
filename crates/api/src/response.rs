//! Response bodies for the OpenAI-compatible endpoints and media downloads.

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use infergate_core::completion::{ChatMessage, CompletionOutput, FinishReason};
use infergate_core::media::MediaPayload;
use infergate_worker::facade::Completed;
use serde::Serialize;

/// `chat.completion` object.
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    /// Unix seconds.
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Completed<CompletionOutput>> for ChatCompletionResponse {
    fn from(done: Completed<CompletionOutput>) -> Self {
        let output = done.output;
        Self {
            id: format!("chatcmpl-{}", done.job_id),
            object: "chat.completion",
            created: chrono::Utc::now().timestamp(),
            model: done.model,
            usage: Usage {
                prompt_tokens: output.prompt_tokens,
                completion_tokens: output.completion_tokens,
                total_tokens: output.total_tokens(),
            },
            choices: vec![ChatChoice {
                index: 0,
                finish_reason: output.finish_reason(),
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: output.text,
                },
            }],
        }
    }
}

/// `list` object returned by `/v1/models`.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

#[derive(Debug, Serialize)]
pub struct ModelCard {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: String,
}

/// Binary job output sent back with its content type.
///
/// Payloads that carry a file name are sent as an attachment.
pub struct MediaResponse(pub MediaPayload);

impl IntoResponse for MediaResponse {
    fn into_response(self) -> Response {
        let MediaPayload {
            bytes,
            content_type,
            file_name,
        } = self.0;

        match file_name {
            Some(name) => (
                [
                    (CONTENT_TYPE, content_type),
                    (CONTENT_DISPOSITION, format!("attachment; filename=\"{name}\"")),
                ],
                bytes,
            )
                .into_response(),
            None => ([(CONTENT_TYPE, content_type)], bytes).into_response(),
        }
    }
}
