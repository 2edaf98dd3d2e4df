use std::path::PathBuf;
use std::time::Duration;

use crate::supervisor::TimeoutPolicy;
use crate::workspace::DEFAULT_WORKSPACE_PREFIX;

/// Worker pool, permit pool and deadline settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Worker tasks pulling from the job queue. May exceed `permits` so that
    /// jobs can queue for a permit without starving the pool.
    pub workers: usize,
    /// Heavy operations allowed at once (hardware limit).
    pub permits: usize,
    /// How long a request waits for its job, measured from submission.
    pub job_timeout: Duration,
    pub timeout_policy: TimeoutPolicy,
    /// Directory under which per-job workspaces are created.
    pub scratch_root: PathBuf,
    pub scratch_prefix: String,
}

impl ExecutorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default               |
    /// |----------------------|-----------------------|
    /// | `EXECUTOR_WORKERS`   | `4`                   |
    /// | `EXECUTOR_PERMITS`   | `2`                   |
    /// | `JOB_TIMEOUT_SECS`   | `600`                 |
    /// | `JOB_TIMEOUT_POLICY` | `drain`               |
    /// | `SCRATCH_ROOT`       | system temp directory |
    /// | `SCRATCH_PREFIX`     | `infergate_`          |
    pub fn from_env() -> Self {
        let workers: usize = std::env::var("EXECUTOR_WORKERS")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("EXECUTOR_WORKERS must be a valid usize");
        assert!(workers >= 1, "EXECUTOR_WORKERS must be at least 1");

        let permits: usize = std::env::var("EXECUTOR_PERMITS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("EXECUTOR_PERMITS must be a valid usize");
        assert!(permits >= 1, "EXECUTOR_PERMITS must be at least 1");

        let job_timeout_secs: u64 = std::env::var("JOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("JOB_TIMEOUT_SECS must be a valid u64");

        let timeout_policy: TimeoutPolicy = std::env::var("JOB_TIMEOUT_POLICY")
            .unwrap_or_else(|_| "drain".into())
            .parse()
            .unwrap_or_else(|e| panic!("JOB_TIMEOUT_POLICY: {e}"));

        let scratch_root = std::env::var("SCRATCH_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        let scratch_prefix =
            std::env::var("SCRATCH_PREFIX").unwrap_or_else(|_| DEFAULT_WORKSPACE_PREFIX.into());

        Self {
            workers,
            permits,
            job_timeout: Duration::from_secs(job_timeout_secs),
            timeout_policy,
            scratch_root,
            scratch_prefix,
        }
    }
}
