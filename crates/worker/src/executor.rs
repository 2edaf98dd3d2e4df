//! Fixed-size worker pool for heavy jobs.
//!
//! Submission only enqueues, so it is fast and never blocks on the backend.
//! Each worker takes the oldest queued job and carries it all the way
//! through: permit acquisition, workspace scope, backend call, terminal
//! state, permit release. Errors and panics inside the backend call become a
//! `Failed` job; they never take a worker down.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use infergate_core::error::CoreError;
use infergate_core::job::{JobFailure, JobInput, JobOutput, JobRecord, JobState};
use infergate_core::types::{new_job_id, JobId};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::admission::{AdmissionController, Permit};
use crate::backend::InferenceBackend;
use crate::workspace::{ScratchSpace, WorkspaceScope};

type JobResult = Result<JobOutput, JobFailure>;

// ---------------------------------------------------------------------------
// Job record sharing
// ---------------------------------------------------------------------------

struct RecordCell {
    id: JobId,
    record: Mutex<JobRecord>,
    state: watch::Sender<JobState>,
}

/// Read-only view of a job's lifecycle that outlives the caller's wait.
#[derive(Clone)]
pub struct JobWatch(Arc<RecordCell>);

impl JobWatch {
    fn new(record: JobRecord) -> Self {
        let (state, _) = watch::channel(record.state);
        Self(Arc::new(RecordCell {
            id: record.id,
            record: Mutex::new(record),
            state,
        }))
    }

    pub fn id(&self) -> JobId {
        self.0.id
    }

    pub fn state(&self) -> JobState {
        *self.0.state.borrow()
    }

    pub fn snapshot(&self) -> JobRecord {
        self.lock().clone()
    }

    /// Resolve once the job reaches a terminal state.
    pub async fn wait_terminal(&self) -> JobRecord {
        let mut rx = self.0.state.subscribe();
        let _ = rx.wait_for(|state| state.is_terminal()).await;
        self.snapshot()
    }

    fn lock(&self) -> MutexGuard<'_, JobRecord> {
        self.0.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: JobState) {
        let result = self.lock().transition(next);
        match result {
            Ok(()) => {
                self.0.state.send_replace(next);
            }
            Err(e) => tracing::error!(job_id = %self.0.id, error = %e, "Rejected job transition"),
        }
    }

    fn fail(&self, failure: JobFailure) {
        let result = self.lock().fail(failure);
        match result {
            Ok(()) => {
                self.0.state.send_replace(JobState::Failed);
            }
            Err(e) => tracing::error!(job_id = %self.0.id, error = %e, "Rejected job transition"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Caller's side of a submitted job.
pub struct JobHandle {
    pub(crate) watch: JobWatch,
    pub(crate) result: oneshot::Receiver<JobResult>,
    pub(crate) cancel: CancellationToken,
    pub(crate) submitted_at: Instant,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id())
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.watch.id()
    }

    pub fn watch(&self) -> JobWatch {
        self.watch.clone()
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Wait for the job with no deadline.
    pub async fn wait(self) -> Result<JobOutput, CoreError> {
        let id = self.id();
        match self.result.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(failure)) => Err(failure.into()),
            Err(_) => Err(CoreError::Internal(format!(
                "job {id} ended without a result"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

struct QueuedJob {
    watch: JobWatch,
    input: JobInput,
    reply: oneshot::Sender<JobResult>,
    cancel: CancellationToken,
}

struct WorkerShared {
    backend: Arc<dyn InferenceBackend>,
    admission: Arc<AdmissionController>,
    scratch: Arc<dyn ScratchSpace>,
    queued: AtomicUsize,
    active: AtomicUsize,
}

/// Point-in-time executor gauges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub workers: usize,
    /// Jobs waiting for a worker.
    pub queued: usize,
    /// Jobs taken by a worker and not yet finished (includes permit waits).
    pub active: usize,
    pub permits: usize,
    pub permits_outstanding: usize,
}

pub struct JobExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    shared: Arc<WorkerShared>,
    tracker: TaskTracker,
    workers: usize,
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl JobExecutor {
    /// Spawn `workers` worker tasks on the current runtime.
    pub fn start(
        workers: usize,
        backend: Arc<dyn InferenceBackend>,
        admission: Arc<AdmissionController>,
        scratch: Arc<dyn ScratchSpace>,
    ) -> Result<Self, CoreError> {
        if workers == 0 {
            return Err(CoreError::Validation(
                "worker pool size must be at least 1".to_string(),
            ));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shared = Arc::new(WorkerShared {
            backend,
            admission,
            scratch,
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        });

        let tracker = TaskTracker::new();
        for worker_id in 0..workers {
            tracker.spawn(worker_loop(
                worker_id,
                Arc::clone(&receiver),
                Arc::clone(&shared),
            ));
        }

        tracing::info!(
            workers,
            permits = shared.admission.capacity(),
            backend = shared.backend.name(),
            "Job executor started",
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            shared,
            tracker,
            workers,
        })
    }

    /// Queue a job. Returns as soon as the job is enqueued.
    pub fn submit(&self, input: JobInput) -> Result<JobHandle, CoreError> {
        let submitted_at = Instant::now();
        let kind = input.kind();
        let watch = JobWatch::new(JobRecord::new(new_job_id(), kind));
        let (reply, result) = oneshot::channel();
        let cancel = CancellationToken::new();

        let job = QueuedJob {
            watch: watch.clone(),
            input,
            reply,
            cancel: cancel.clone(),
        };

        {
            let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(sender) = sender.as_ref() else {
                return Err(shutting_down());
            };
            self.shared.queued.fetch_add(1, Ordering::AcqRel);
            if sender.send(job).is_err() {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                return Err(shutting_down());
            }
        }

        tracing::debug!(job_id = %watch.id(), kind = %kind, "Job queued");

        Ok(JobHandle {
            watch,
            result,
            cancel,
            submitted_at,
        })
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            workers: self.workers,
            queued: self.shared.queued.load(Ordering::Acquire),
            active: self.shared.active.load(Ordering::Acquire),
            permits: self.shared.admission.capacity(),
            permits_outstanding: self.shared.admission.outstanding(),
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.shared.admission
    }

    /// Stop accepting jobs and wait up to `grace` for queued and running
    /// jobs to finish. Returns `true` if every worker exited in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.tracker.close();

        let stats = self.stats();
        tracing::info!(
            queued = stats.queued,
            active = stats.active,
            grace_secs = grace.as_secs(),
            "Draining job executor",
        );

        let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
        if !drained {
            tracing::warn!(
                active = self.shared.active.load(Ordering::Acquire),
                "Job executor did not drain before the grace period elapsed",
            );
        }
        drained
    }
}

fn shutting_down() -> CoreError {
    CoreError::NotReady("job executor is shutting down".to_string())
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn worker_loop(
    worker_id: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedJob>>>,
    shared: Arc<WorkerShared>,
) {
    tracing::debug!(worker_id, "Worker started");
    loop {
        // The queue lock is held until the dequeued job has its permit, so
        // permits are granted in submission order however many workers idle.
        let (job, admission) = {
            let mut queue = queue.lock().await;
            let Some(job) = queue.recv().await else {
                break;
            };
            shared.queued.fetch_sub(1, Ordering::AcqRel);
            let admission = admit(worker_id, &shared, &job).await;
            (job, admission)
        };
        if let Some(admission) = admission {
            run_job(worker_id, &shared, job, admission).await;
        }
    }
    tracing::debug!(worker_id, "Worker stopped");
}

/// Mark the job Admitted and wait for a permit. Returns `None` if the caller
/// abandoned the job first; it is then already recorded as TimedOut.
async fn admit(
    worker_id: usize,
    shared: &WorkerShared,
    job: &QueuedJob,
) -> Option<Result<Permit, CoreError>> {
    let job_id = job.watch.id();
    let kind = job.input.kind();

    if job.cancel.is_cancelled() {
        job.watch.transition(JobState::TimedOut);
        tracing::info!(job_id = %job_id, kind = %kind, worker_id, "Job abandoned before admission");
        return None;
    }

    job.watch.transition(JobState::Admitted);
    shared.active.fetch_add(1, Ordering::AcqRel);

    tokio::select! {
        biased;
        () = job.cancel.cancelled() => {
            shared.active.fetch_sub(1, Ordering::AcqRel);
            job.watch.transition(JobState::TimedOut);
            tracing::warn!(job_id = %job_id, kind = %kind, worker_id, "Job aborted while waiting for a permit");
            None
        }
        permit = shared.admission.acquire() => Some(permit),
    }
}

async fn run_job(
    worker_id: usize,
    shared: &WorkerShared,
    job: QueuedJob,
    admission: Result<Permit, CoreError>,
) {
    let QueuedJob {
        watch,
        input,
        reply,
        cancel,
    } = job;
    let job_id = watch.id();
    let kind = input.kind();
    let started = Instant::now();

    let outcome = match admission {
        Ok(permit) => tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = execute(shared, &watch, &input, permit) => Some(result),
        },
        Err(e) => Some(Err(JobFailure::new("admission_error", e.to_string()))),
    };

    shared.active.fetch_sub(1, Ordering::AcqRel);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Some(Ok(output)) => {
            watch.transition(JobState::Succeeded);
            tracing::info!(job_id = %job_id, kind = %kind, worker_id, elapsed_ms, "Job succeeded");
            // The caller may have stopped waiting; that is fine.
            let _ = reply.send(Ok(output));
        }
        Some(Err(failure)) => {
            tracing::warn!(
                job_id = %job_id,
                kind = %kind,
                worker_id,
                elapsed_ms,
                failure_kind = %failure.kind,
                error = %failure.message,
                "Job failed",
            );
            watch.fail(failure.clone());
            let _ = reply.send(Err(failure));
        }
        None => {
            watch.transition(JobState::TimedOut);
            tracing::warn!(job_id = %job_id, kind = %kind, worker_id, elapsed_ms, "Job aborted after deadline");
        }
    }
}

/// Workspace and backend call under an already granted permit. The permit
/// is held until this returns; the workspace is released before it does.
async fn execute(
    shared: &WorkerShared,
    watch: &JobWatch,
    input: &JobInput,
    permit: Permit,
) -> JobResult {
    let job_id = watch.id();
    let _permit = permit;

    watch.transition(JobState::Running);
    tracing::debug!(
        job_id = %job_id,
        permits_outstanding = shared.admission.outstanding(),
        "Permit acquired",
    );

    let scope = WorkspaceScope::open(Arc::clone(&shared.scratch), job_id)
        .await
        .map_err(|e| JobFailure::new("workspace_error", format!("failed to create workspace: {e}")))?;

    let result = AssertUnwindSafe(shared.backend.execute(input, scope.workspace()))
        .catch_unwind()
        .await;

    scope.close().await;

    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(JobFailure::new(e.kind(), e.to_string())),
        Err(payload) => Err(JobFailure::new("panic", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("job panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("job panicked: {msg}")
    } else {
        "job panicked".to_string()
    }
}
