//! Bounded waiting on job results.
//!
//! The deadline runs from the moment the job was submitted to the executor,
//! so it covers queueing, permit wait and execution. When it passes, the
//! caller gets [`CoreError::Timeout`] immediately. What happens to the job
//! is decided by [`TimeoutPolicy`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use infergate_core::error::CoreError;
use infergate_core::job::JobOutput;
use serde::Serialize;

use crate::executor::JobHandle;

/// What to do with a job whose caller stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Let the job run to completion in the background. It keeps its permit
    /// and workspace until then, so sustained timeouts can exhaust the
    /// permit pool.
    #[default]
    Drain,
    /// Cancel the job: its permit and workspace are freed right away and it
    /// ends in the `TimedOut` state.
    Abort,
}

impl FromStr for TimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drain" => Ok(Self::Drain),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "unknown timeout policy '{other}', expected 'drain' or 'abort'"
            )),
        }
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drain => f.write_str("drain"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutSupervisor {
    deadline: Duration,
    policy: TimeoutPolicy,
}

impl TimeoutSupervisor {
    pub fn new(deadline: Duration, policy: TimeoutPolicy) -> Self {
        Self { deadline, policy }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn policy(&self) -> TimeoutPolicy {
        self.policy
    }

    /// Wait for `handle`'s result until the deadline passes.
    pub async fn await_result(&self, mut handle: JobHandle) -> Result<JobOutput, CoreError> {
        let job_id = handle.id();
        let deadline = handle.submitted_at + self.deadline;

        match tokio::time::timeout_at(deadline, &mut handle.result).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(failure))) => Err(failure.into()),
            Ok(Err(_)) => Err(CoreError::Internal(format!(
                "job {job_id} ended without a result"
            ))),
            Err(_) => {
                let waited = handle.submitted_at.elapsed();
                tracing::warn!(
                    job_id = %job_id,
                    state = %handle.watch.state(),
                    waited_ms = waited.as_millis() as u64,
                    policy = %self.policy,
                    "Deadline exceeded, returning timeout to caller",
                );
                if self.policy == TimeoutPolicy::Abort {
                    handle.cancel.cancel();
                }
                Err(CoreError::Timeout { waited })
            }
        }
    }
}
