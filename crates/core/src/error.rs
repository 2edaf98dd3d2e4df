use std::time::Duration;

/// Failure taxonomy shared by every request path.
///
/// `Validation` and `NotReady` are raised before a job exists. `Execution`
/// is captured inside a worker and stored on the job. `Timeout` is produced
/// only by the timeout supervisor and never implies that the job failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Execution failed ({kind}): {message}")]
    Execution { kind: String, message: String },

    #[error("Timed out after {}ms", waited.as_millis())]
    Timeout { waited: Duration },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for an execution failure.
    pub fn execution(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
