//! Stub backend and counting scratch space shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use infergate_core::completion::CompletionOutput;
use infergate_core::job::{JobInput, JobOutput};
use infergate_core::media::{MediaPayload, SpeechRequest, AUDIO_WAV, SYNCED_VIDEO_FILE_NAME, VIDEO_MP4};
use infergate_core::types::JobId;

use crate::backend::{BackendError, InferenceBackend};
use crate::workspace::{ScratchSpace, Workspace};

pub fn speech(text: &str) -> JobInput {
    JobInput::Speech(SpeechRequest {
        text: text.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub enum StubMode {
    #[default]
    Succeed,
    Fail,
    /// Panic when the input text equals the given string.
    PanicOn(String),
}

/// Deterministic backend: echoes its input after `delay`.
#[derive(Default)]
pub struct StubBackend {
    pub fail_init: bool,
    pub delay: Duration,
    pub mode: StubMode,
    pub(crate) running: AtomicUsize,
    pub(crate) peak: AtomicUsize,
    pub(crate) seen: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn peak_running(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub async fn wait_for_running(&self, n: usize, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            while self.running.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("backend never reached the expected concurrency");
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    async fn initialize(&self) -> Result<(), BackendError> {
        if self.fail_init {
            return Err(BackendError::Initialization("weights missing".to_string()));
        }
        Ok(())
    }

    async fn execute(
        &self,
        input: &JobInput,
        _workspace: &Workspace,
    ) -> Result<JobOutput, BackendError> {
        let label = match input {
            JobInput::Speech(req) => req.text.clone(),
            JobInput::Completion(job) => job
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            JobInput::MediaSync(_) => "media".to_string(),
        };
        self.seen.lock().unwrap().push(label.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        tokio::time::sleep(self.delay).await;

        match &self.mode {
            StubMode::Succeed => {}
            StubMode::Fail => return Err(BackendError::Inference("CUDA out of memory".to_string())),
            StubMode::PanicOn(trigger) if *trigger == label => panic!("{label}"),
            StubMode::PanicOn(_) => {}
        }

        Ok(match input {
            JobInput::Speech(req) => JobOutput::Media(MediaPayload {
                bytes: req.text.as_bytes().to_vec(),
                content_type: AUDIO_WAV.to_string(),
                file_name: None,
            }),
            JobInput::Completion(job) => JobOutput::Completion(CompletionOutput {
                text: format!("echo: {label}"),
                prompt_tokens: job.messages.len() as u32,
                completion_tokens: 2,
                finished: true,
            }),
            JobInput::MediaSync(req) => {
                let mut bytes = req.video.bytes.clone();
                bytes.extend_from_slice(&req.audio.bytes);
                JobOutput::Media(MediaPayload {
                    bytes,
                    content_type: VIDEO_MP4.to_string(),
                    file_name: Some(SYNCED_VIDEO_FILE_NAME.to_string()),
                })
            }
        })
    }
}

/// In-memory scratch space that counts create/release calls per job.
#[derive(Default)]
pub struct CountingScratch {
    created: Mutex<Vec<JobId>>,
    released: Mutex<Vec<JobId>>,
}

impl CountingScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    /// Number of release calls. Panics if any job was released twice.
    pub fn released(&self) -> usize {
        let released = self.released.lock().unwrap();
        let mut unique = released.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), released.len(), "a workspace was released twice");
        released.len()
    }

    pub async fn wait_for_releases(&self, n: usize, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            while self.released() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("workspaces were not released in time");
    }
}

#[async_trait]
impl ScratchSpace for CountingScratch {
    async fn create(&self, job_id: JobId) -> std::io::Result<Workspace> {
        self.created.lock().unwrap().push(job_id);
        Ok(Workspace::new(job_id, std::env::temp_dir().join(format!("counting_{job_id}"))))
    }

    async fn release(&self, workspace: &Workspace) -> std::io::Result<()> {
        self.released.lock().unwrap().push(workspace.job_id());
        Ok(())
    }
}
