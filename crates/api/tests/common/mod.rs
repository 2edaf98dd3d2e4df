#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use infergate_core::completion::CompletionOutput;
use infergate_core::job::{JobInput, JobOutput};
use infergate_core::media::{MediaPayload, AUDIO_WAV, SYNCED_VIDEO_FILE_NAME, VIDEO_MP4};
use infergate_core::readiness::ReadinessGate;
use infergate_runner::config::RunnerConfig;
use infergate_worker::admission::AdmissionController;
use infergate_worker::backend::{BackendError, InferenceBackend};
use infergate_worker::config::ExecutorConfig;
use infergate_worker::executor::JobExecutor;
use infergate_worker::facade::InferenceFacade;
use infergate_worker::supervisor::{TimeoutPolicy, TimeoutSupervisor};
use infergate_worker::workspace::{DirScratchSpace, Workspace};
use tempfile::TempDir;
use tower::ServiceExt;

use infergate_api::config::{ModelConfig, ServerConfig};
use infergate_api::router::build_app_router;
use infergate_api::state::AppState;

pub const TEST_MODEL_ID: &str = "acme/echo-7b";
pub const TEST_MODEL_ALIAS: &str = "echo-7b";

/// Speech text that makes [`EchoBackend`] fail.
pub const FAILING_TEXT: &str = "fail please";

/// Deterministic backend that echoes its inputs.
///
/// Completions answer `echo: <last message>` and report `length` when
/// `max_tokens` is below 2. Media sync concatenates video and audio bytes.
/// Speech returns the text bytes.
#[derive(Default)]
pub struct EchoBackend {
    pub delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl EchoBackend {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_running(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn initialize(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn execute(
        &self,
        input: &JobInput,
        workspace: &Workspace,
    ) -> Result<JobOutput, BackendError> {
        assert!(workspace.path().is_dir(), "workspace must exist while running");

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(input.kind().to_string());
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        match input {
            JobInput::Completion(job) => {
                let last = job.messages.last().map(|m| m.content.as_str()).unwrap_or("");
                Ok(JobOutput::Completion(CompletionOutput {
                    text: format!("echo: {last}"),
                    prompt_tokens: job.messages.len() as u32,
                    completion_tokens: 2,
                    finished: job.sampling.max_tokens >= 2,
                }))
            }
            JobInput::MediaSync(request) => {
                let mut bytes = request.video.bytes.clone();
                bytes.extend_from_slice(&request.audio.bytes);
                Ok(JobOutput::Media(MediaPayload {
                    bytes,
                    content_type: VIDEO_MP4.to_string(),
                    file_name: Some(SYNCED_VIDEO_FILE_NAME.to_string()),
                }))
            }
            JobInput::Speech(request) if request.text == FAILING_TEXT => {
                Err(BackendError::Inference("CUDA out of memory".to_string()))
            }
            JobInput::Speech(request) => Ok(JobOutput::Media(MediaPayload {
                bytes: request.text.clone().into_bytes(),
                content_type: AUDIO_WAV.to_string(),
                file_name: None,
            })),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub gate: Arc<ReadinessGate>,
    pub backend: Arc<EchoBackend>,
    pub scratch: TempDir,
}

impl TestApp {
    /// Open the readiness gate.
    pub fn mark_ready(&self) {
        self.gate.begin_initializing().unwrap();
        self.gate.mark_ready().unwrap();
    }

    /// Number of workspaces still on disk.
    pub fn workspaces_on_disk(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(scratch_root: &std::path::Path, permits: usize, job_timeout: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: 1024 * 1024,
        model: ModelConfig {
            id: TEST_MODEL_ID.to_string(),
            alias: TEST_MODEL_ALIAS.to_string(),
            owner: "acme".to_string(),
        },
        executor: ExecutorConfig {
            workers: 4,
            permits,
            job_timeout,
            timeout_policy: TimeoutPolicy::Drain,
            scratch_root: scratch_root.to_path_buf(),
            scratch_prefix: "job_".to_string(),
        },
        runner: RunnerConfig {
            init: None,
            completion: None,
            media_sync: None,
            speech: None,
            command_timeout: Duration::from_secs(5),
        },
    }
}

/// A ready app backed by an instant [`EchoBackend`].
pub fn ready_app() -> TestApp {
    let app = build_test_app(EchoBackend::default(), 2, Duration::from_secs(5));
    app.mark_ready();
    app
}

/// Build the full application router around `backend`, with the gate closed.
pub fn build_test_app(backend: EchoBackend, permits: usize, job_timeout: Duration) -> TestApp {
    build_test_app_with_request_timeout(backend, permits, job_timeout, 30)
}

/// Like [`build_test_app`] with a custom HTTP backstop timeout.
pub fn build_test_app_with_request_timeout(
    backend: EchoBackend,
    permits: usize,
    job_timeout: Duration,
    request_timeout_secs: u64,
) -> TestApp {
    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(scratch.path(), permits, job_timeout);
    config.request_timeout_secs = request_timeout_secs;

    let backend = Arc::new(backend);
    let gate = Arc::new(ReadinessGate::new());
    let admission = Arc::new(AdmissionController::new(permits).unwrap());
    let executor = Arc::new(
        JobExecutor::start(
            config.executor.workers,
            backend.clone(),
            admission,
            Arc::new(DirScratchSpace::new(scratch.path(), "job_")),
        )
        .unwrap(),
    );
    let facade = InferenceFacade::new(
        Arc::clone(&gate),
        executor,
        TimeoutSupervisor::new(job_timeout, config.executor.timeout_policy),
        TEST_MODEL_ALIAS,
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        facade: Arc::new(facade),
    };

    TestApp {
        router: build_app_router(state, &config),
        gate,
        backend,
        scratch,
    }
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn post_raw(app: &TestApp, uri: &str, content_type: &str, body: Vec<u8>) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap();
    app.router.clone().oneshot(request).await.unwrap()
}

pub const BOUNDARY: &str = "infergate-test-boundary";

/// Encode `(field name, file name, bytes)` parts as multipart/form-data.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: &TestApp, uri: &str, parts: &[(&str, &str, &[u8])]) -> Response<Body> {
    post_raw(
        app,
        uri,
        &format!("multipart/form-data; boundary={BOUNDARY}"),
        multipart_body(parts),
    )
    .await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
