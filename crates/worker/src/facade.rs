//! Request-facing entry points.
//!
//! Each operation validates its input, checks the readiness gate, submits a
//! job and waits for it under the timeout supervisor. Validation and
//! readiness failures are returned before any job or permit exists.

use std::sync::Arc;

use infergate_core::completion::{CompletionOutput, CompletionRequest};
use infergate_core::error::CoreError;
use infergate_core::job::{JobInput, JobKind, JobOutput};
use infergate_core::media::{MediaFile, MediaPayload, MediaSyncRequest, SpeechRequest};
use infergate_core::readiness::ReadinessGate;
use infergate_core::types::JobId;

use crate::executor::JobExecutor;
use crate::supervisor::TimeoutSupervisor;

/// A finished job's output, ready to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed<T> {
    pub job_id: JobId,
    pub model: String,
    pub output: T,
}

pub struct InferenceFacade {
    gate: Arc<ReadinessGate>,
    executor: Arc<JobExecutor>,
    supervisor: TimeoutSupervisor,
    model: String,
}

impl InferenceFacade {
    pub fn new(
        gate: Arc<ReadinessGate>,
        executor: Arc<JobExecutor>,
        supervisor: TimeoutSupervisor,
        model: impl Into<String>,
    ) -> Self {
        Self {
            gate,
            executor,
            supervisor,
            model: model.into(),
        }
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn executor(&self) -> &JobExecutor {
        &self.executor
    }

    pub fn supervisor(&self) -> &TimeoutSupervisor {
        &self.supervisor
    }

    /// Model name used when a request does not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat completion.
    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completed<CompletionOutput>, CoreError> {
        let job = request.validate(&self.model)?;
        let model = job.model.clone();
        let (job_id, output) = self.run(JobInput::Completion(job)).await?;
        match output {
            JobOutput::Completion(output) => Ok(Completed {
                job_id,
                model,
                output,
            }),
            JobOutput::Media(_) => Err(unexpected_output(job_id, JobKind::Completion)),
        }
    }

    /// Lip-sync `video` to `audio`. Both parts are required.
    pub async fn sync_media(
        &self,
        video: Option<MediaFile>,
        audio: Option<MediaFile>,
    ) -> Result<Completed<MediaPayload>, CoreError> {
        let request = MediaSyncRequest::from_parts(video, audio)?;
        let (job_id, output) = self.run(JobInput::MediaSync(request)).await?;
        self.media(job_id, JobKind::MediaSync, output)
    }

    /// Text to speech.
    pub async fn synthesize_speech(
        &self,
        request: SpeechRequest,
    ) -> Result<Completed<MediaPayload>, CoreError> {
        let request = request.validate()?;
        let (job_id, output) = self.run(JobInput::Speech(request)).await?;
        self.media(job_id, JobKind::Speech, output)
    }

    async fn run(&self, input: JobInput) -> Result<(JobId, JobOutput), CoreError> {
        self.gate.ensure_ready()?;
        let handle = self.executor.submit(input)?;
        let job_id = handle.id();
        let output = self.supervisor.await_result(handle).await?;
        Ok((job_id, output))
    }

    fn media(
        &self,
        job_id: JobId,
        kind: JobKind,
        output: JobOutput,
    ) -> Result<Completed<MediaPayload>, CoreError> {
        match output {
            JobOutput::Media(output) => Ok(Completed {
                job_id,
                model: self.model.clone(),
                output,
            }),
            JobOutput::Completion(_) => Err(unexpected_output(job_id, kind)),
        }
    }
}

fn unexpected_output(job_id: JobId, kind: JobKind) -> CoreError {
    CoreError::Internal(format!(
        "backend returned the wrong output type for {kind} job {job_id}"
    ))
}
