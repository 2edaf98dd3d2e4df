//! Seam between the orchestration core and the model engine.
//!
//! The engine itself is opaque: it initializes once (slowly) and then turns a
//! [`JobInput`] into a [`JobOutput`] or a failure, using the job's
//! [`Workspace`] for any scratch files.

use std::sync::Arc;

use async_trait::async_trait;
use infergate_core::job::{JobInput, JobKind, JobOutput};
use infergate_core::readiness::ReadinessGate;
use tokio::task::JoinHandle;

use crate::workspace::Workspace;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{0} jobs are not supported by this backend")]
    Unsupported(JobKind),

    #[error("backend initialization failed: {0}")]
    Initialization(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Failure category recorded on the job.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "unsupported",
            Self::Initialization(_) => "initialization_error",
            Self::Inference(_) => "backend_error",
            Self::Io(_) => "io_error",
        }
    }
}

#[async_trait]
pub trait InferenceBackend: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Load weights, warm up, etc. Called exactly once at startup.
    async fn initialize(&self) -> Result<(), BackendError>;

    /// Run one job. The workspace is exclusive to this call.
    async fn execute(
        &self,
        input: &JobInput,
        workspace: &Workspace,
    ) -> Result<JobOutput, BackendError>;
}

/// Initialize `backend` on a background task and open `gate` when done.
///
/// The returned handle resolves to the initialization result; a failure
/// leaves the gate closed and is meant to be treated as fatal by the caller.
pub fn spawn_initialization(
    backend: Arc<dyn InferenceBackend>,
    gate: Arc<ReadinessGate>,
) -> JoinHandle<Result<(), BackendError>> {
    tokio::spawn(async move {
        gate.begin_initializing()
            .map_err(|e| BackendError::Initialization(e.to_string()))?;
        tracing::info!(backend = backend.name(), "Backend initialization started");

        let started = tokio::time::Instant::now();
        backend.initialize().await?;

        gate.mark_ready()
            .map_err(|e| BackendError::Initialization(e.to_string()))?;
        tracing::info!(
            backend = backend.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Backend initialization complete",
        );
        Ok(())
    })
}
