//! Per-job scratch resources with exactly-once release.
//!
//! A [`WorkspaceScope`] is opened when a job starts running and closed when
//! its body finishes, whatever the outcome. If the scope is dropped without
//! being closed (the job future was aborted), the release is handed to the
//! runtime instead. Either way [`ScratchSpace::release`] runs once per
//! workspace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use infergate_core::types::JobId;

/// Default directory-name prefix for job workspaces.
pub const DEFAULT_WORKSPACE_PREFIX: &str = "infergate_";

/// Scratch area owned by a single job.
#[derive(Debug, Clone)]
pub struct Workspace {
    job_id: JobId,
    root: PathBuf,
}

impl Workspace {
    pub fn new(job_id: JobId, root: PathBuf) -> Self {
        Self { job_id, root }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of a file inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Allocator for job workspaces.
#[async_trait]
pub trait ScratchSpace: Send + Sync + 'static {
    async fn create(&self, job_id: JobId) -> std::io::Result<Workspace>;

    /// Free everything the workspace holds. Called once per workspace.
    async fn release(&self, workspace: &Workspace) -> std::io::Result<()>;
}

/// Workspaces backed by directories under a common root.
#[derive(Debug, Clone)]
pub struct DirScratchSpace {
    root: PathBuf,
    prefix: String,
}

impl DirScratchSpace {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ScratchSpace for DirScratchSpace {
    async fn create(&self, job_id: JobId) -> std::io::Result<Workspace> {
        let dir = self.root.join(format!("{}{job_id}", self.prefix));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Workspace::new(job_id, dir))
    }

    async fn release(&self, workspace: &Workspace) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(workspace.path()).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Scoped ownership of one workspace.
pub struct WorkspaceScope {
    scratch: Arc<dyn ScratchSpace>,
    workspace: Workspace,
    released: bool,
}

impl WorkspaceScope {
    /// Allocate a workspace for `job_id`.
    pub async fn open(scratch: Arc<dyn ScratchSpace>, job_id: JobId) -> std::io::Result<Self> {
        let workspace = scratch.create(job_id).await?;
        tracing::debug!(job_id = %job_id, path = %workspace.path().display(), "Workspace created");
        Ok(Self {
            scratch,
            workspace,
            released: false,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Release the workspace now. Release errors are logged, not returned:
    /// they never change the job's outcome.
    pub async fn close(mut self) {
        self.released = true;
        release_logged(self.scratch.as_ref(), &self.workspace).await;
    }
}

impl Drop for WorkspaceScope {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let scratch = Arc::clone(&self.scratch);
        let workspace = self.workspace.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release_logged(scratch.as_ref(), &workspace).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    job_id = %workspace.job_id(),
                    path = %workspace.path().display(),
                    "No runtime available, workspace leaked",
                );
            }
        }
    }
}

async fn release_logged(scratch: &dyn ScratchSpace, workspace: &Workspace) {
    match scratch.release(workspace).await {
        Ok(()) => {
            tracing::debug!(job_id = %workspace.job_id(), "Workspace released");
        }
        Err(e) => {
            tracing::warn!(
                job_id = %workspace.job_id(),
                path = %workspace.path().display(),
                error = %e,
                "Failed to release workspace",
            );
        }
    }
}
