//! Job lifecycle model.
//!
//! A job is one admitted unit of heavy work. Its state only moves forward:
//!
//! ```text
//! Pending -> Admitted -> Running -> Succeeded | Failed
//!    \___________\__________\_____> TimedOut   (abort policy only)
//! ```

use std::fmt;

use serde::Serialize;

use crate::completion::{CompletionJob, CompletionOutput};
use crate::error::CoreError;
use crate::media::{MediaPayload, MediaSyncRequest, SpeechRequest};
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Admitted,
    Running,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }

    /// Whether `self -> next` is a legal forward transition.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Admitted)
                | (Pending, TimedOut)
                | (Admitted, Running)
                | (Admitted, Failed)
                | (Admitted, TimedOut)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Running, TimedOut)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Admitted => "admitted",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Completion,
    MediaSync,
    Speech,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::MediaSync => "media_sync",
            Self::Speech => "speech",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated input handed to the backend.
#[derive(Debug, Clone)]
pub enum JobInput {
    Completion(CompletionJob),
    MediaSync(MediaSyncRequest),
    Speech(SpeechRequest),
}

impl JobInput {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Completion(_) => JobKind::Completion,
            Self::MediaSync(_) => JobKind::MediaSync,
            Self::Speech(_) => JobKind::Speech,
        }
    }
}

/// Successful backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Completion(CompletionOutput),
    Media(MediaPayload),
}

/// Failure captured inside a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    /// Machine-readable failure category, e.g. `backend_error` or `panic`.
    pub kind: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<JobFailure> for CoreError {
    fn from(failure: JobFailure) -> Self {
        CoreError::Execution {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Observable bookkeeping for a single job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub error: Option<JobFailure>,
}

impl JobRecord {
    pub fn new(id: JobId, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            state: JobState::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Move to `next`, stamping `started_at` / `finished_at` as appropriate.
    pub fn transition(&mut self, next: JobState) -> Result<(), CoreError> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::Internal(format!(
                "job {} cannot move from {} to {next}",
                self.id, self.state
            )));
        }
        let now = chrono::Utc::now();
        if next == JobState::Running {
            self.started_at = Some(now);
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        self.state = next;
        Ok(())
    }

    /// Record a terminal failure.
    pub fn fail(&mut self, failure: JobFailure) -> Result<(), CoreError> {
        self.transition(JobState::Failed)?;
        self.error = Some(failure);
        Ok(())
    }
}
