//! Chat completion request validation and output model.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default completion length when the caller does not specify one.
pub const DEFAULT_MAX_TOKENS: u32 = 150;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default nucleus sampling mass.
pub const DEFAULT_TOP_P: f32 = 1.0;

/// Upper bound accepted for `temperature`.
const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Raw completion request as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

/// A completion request that passed validation, with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionJob {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    /// Check structural rules and fill in defaults.
    ///
    /// Rules:
    /// - `messages` must not be empty.
    /// - Every message needs a non-blank `role`.
    /// - `max_tokens` must be at least 1.
    /// - `temperature` must be within `0.0..=2.0`.
    /// - `top_p` must be within `(0.0, 1.0]`.
    pub fn validate(self, default_model: &str) -> Result<CompletionJob, CoreError> {
        if self.messages.is_empty() {
            return Err(CoreError::Validation("No messages provided".to_string()));
        }
        for (i, message) in self.messages.iter().enumerate() {
            if message.role.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Message at index {i} is missing a role"
                )));
            }
        }

        let max_tokens = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(CoreError::Validation(
                "max_tokens must be at least 1".to_string(),
            ));
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(CoreError::Validation(format!(
                "temperature must be between 0 and {MAX_TEMPERATURE}"
            )));
        }

        let top_p = self.top_p.unwrap_or(DEFAULT_TOP_P);
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err(CoreError::Validation(
                "top_p must be greater than 0 and at most 1".to_string(),
            ));
        }

        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| default_model.to_string());

        Ok(CompletionJob {
            model,
            messages: self.messages,
            sampling: SamplingParams {
                max_tokens,
                temperature,
                top_p,
            },
        })
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

/// Text produced by the backend together with its token accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutput {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// `true` when the engine reached a natural stop rather than the token limit.
    pub finished: bool,
}

impl CompletionOutput {
    pub fn finish_reason(&self) -> FinishReason {
        if self.finished {
            FinishReason::Stop
        } else {
            FinishReason::Length
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}
