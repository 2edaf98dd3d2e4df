//! [`InferenceBackend`] that shells out to external inference programs.
//!
//! Every job gets its own child process, started inside the job's workspace
//! directory. Inputs are written to well-known files in the workspace and
//! the program is expected to write its result next to them:
//!
//! | Job        | Inputs                                   | Output             |
//! |------------|------------------------------------------|--------------------|
//! | completion | `request.json` (also piped to stdin)     | `response.json` or stdout |
//! | media sync | `input_video.mp4`, `input_audio.wav`     | `output_video.mp4` |
//! | speech     | `input.txt`, `{"text":..}` on stdin      | `output.wav`       |

use std::path::Path;

use async_trait::async_trait;
use infergate_core::completion::{CompletionJob, CompletionOutput};
use infergate_core::job::{JobInput, JobKind, JobOutput};
use infergate_core::media::{
    MediaPayload, MediaSyncRequest, SpeechRequest, AUDIO_WAV, SYNCED_VIDEO_FILE_NAME, VIDEO_MP4,
};
use infergate_worker::backend::{BackendError, InferenceBackend};
use infergate_worker::workspace::Workspace;
use tokio::process::Command;

use crate::config::{CommandSpec, RunnerConfig};
use crate::subprocess::{self, CommandInput, CommandOutput};

pub const COMPLETION_REQUEST_FILE: &str = "request.json";
pub const COMPLETION_RESPONSE_FILE: &str = "response.json";
pub const VIDEO_INPUT_FILE: &str = "input_video.mp4";
pub const AUDIO_INPUT_FILE: &str = "input_audio.wav";
pub const VIDEO_OUTPUT_FILE: &str = "output_video.mp4";
pub const SPEECH_INPUT_FILE: &str = "input.txt";
pub const SPEECH_OUTPUT_FILE: &str = "output.wav";

pub struct CommandBackend {
    config: RunnerConfig,
}

impl CommandBackend {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn spec_for(&self, kind: JobKind) -> Result<&CommandSpec, BackendError> {
        let spec = match kind {
            JobKind::Completion => self.config.completion.as_ref(),
            JobKind::MediaSync => self.config.media_sync.as_ref(),
            JobKind::Speech => self.config.speech.as_ref(),
        };
        spec.ok_or(BackendError::Unsupported(kind))
    }

    async fn run(
        &self,
        spec: &CommandSpec,
        stdin: Vec<u8>,
        working_directory: Option<&Path>,
        vars: &[(&str, &str)],
    ) -> Result<CommandOutput, BackendError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(spec.render_args(vars));

        tracing::debug!(program = %spec.program, "Running inference command");
        let output = subprocess::run_command(
            &mut cmd,
            CommandInput {
                stdin,
                working_directory: working_directory.map(Path::to_path_buf),
                timeout: self.config.command_timeout,
            },
        )
        .await
        .map_err(|e| BackendError::Inference(e.to_string()))?;

        if !output.success() {
            return Err(BackendError::Inference(format!(
                "{} exited with code {}: {}",
                spec.program,
                output.exit_code,
                output.stderr.trim()
            )));
        }
        tracing::debug!(
            program = %spec.program,
            duration_ms = output.duration_ms,
            "Inference command finished",
        );
        Ok(output)
    }

    async fn complete(
        &self,
        job: &CompletionJob,
        workspace: &Workspace,
    ) -> Result<JobOutput, BackendError> {
        let spec = self.spec_for(JobKind::Completion)?;
        let payload = serde_json::to_vec(job)
            .map_err(|e| BackendError::Inference(format!("failed to encode request: {e}")))?;

        let input = workspace.file(COMPLETION_REQUEST_FILE);
        let output = workspace.file(COMPLETION_RESPONSE_FILE);
        tokio::fs::write(&input, &payload).await?;

        let result = self
            .run(
                spec,
                payload,
                Some(workspace.path()),
                &[
                    ("workspace", &path_arg(workspace.path())),
                    ("input", &path_arg(&input)),
                    ("output", &path_arg(&output)),
                ],
            )
            .await?;

        // Prefer the response file; fall back to stdout.
        let bytes = match tokio::fs::read(&output).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => result.stdout,
            Err(e) => return Err(e.into()),
        };
        let completion: CompletionOutput = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Inference(format!("invalid completion output: {e}")))?;
        Ok(JobOutput::Completion(completion))
    }

    async fn sync(
        &self,
        request: &MediaSyncRequest,
        workspace: &Workspace,
    ) -> Result<JobOutput, BackendError> {
        let spec = self.spec_for(JobKind::MediaSync)?;
        let video = workspace.file(VIDEO_INPUT_FILE);
        let audio = workspace.file(AUDIO_INPUT_FILE);
        let output = workspace.file(VIDEO_OUTPUT_FILE);
        tokio::fs::write(&video, &request.video.bytes).await?;
        tokio::fs::write(&audio, &request.audio.bytes).await?;

        self.run(
            spec,
            Vec::new(),
            Some(workspace.path()),
            &[
                ("workspace", &path_arg(workspace.path())),
                ("video", &path_arg(&video)),
                ("audio", &path_arg(&audio)),
                ("output", &path_arg(&output)),
            ],
        )
        .await?;

        Ok(JobOutput::Media(MediaPayload {
            bytes: read_output(&output).await?,
            content_type: VIDEO_MP4.to_string(),
            file_name: Some(SYNCED_VIDEO_FILE_NAME.to_string()),
        }))
    }

    async fn speak(
        &self,
        request: &SpeechRequest,
        workspace: &Workspace,
    ) -> Result<JobOutput, BackendError> {
        let spec = self.spec_for(JobKind::Speech)?;
        let input = workspace.file(SPEECH_INPUT_FILE);
        let output = workspace.file(SPEECH_OUTPUT_FILE);
        tokio::fs::write(&input, request.text.as_bytes()).await?;

        let stdin = serde_json::to_vec(&serde_json::json!({ "text": request.text }))
            .map_err(|e| BackendError::Inference(format!("failed to encode request: {e}")))?;

        self.run(
            spec,
            stdin,
            Some(workspace.path()),
            &[
                ("workspace", &path_arg(workspace.path())),
                ("input", &path_arg(&input)),
                ("output", &path_arg(&output)),
            ],
        )
        .await?;

        Ok(JobOutput::Media(MediaPayload {
            bytes: read_output(&output).await?,
            content_type: AUDIO_WAV.to_string(),
            file_name: None,
        }))
    }
}

#[async_trait]
impl InferenceBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn initialize(&self) -> Result<(), BackendError> {
        let Some(spec) = &self.config.init else {
            tracing::info!("No INIT_COMMAND configured, backend is ready immediately");
            return Ok(());
        };
        self.run(spec, Vec::new(), None, &[])
            .await
            .map(|_| ())
            .map_err(|e| BackendError::Initialization(e.to_string()))
    }

    async fn execute(
        &self,
        input: &JobInput,
        workspace: &Workspace,
    ) -> Result<JobOutput, BackendError> {
        match input {
            JobInput::Completion(job) => self.complete(job, workspace).await,
            JobInput::MediaSync(request) => self.sync(request, workspace).await,
            JobInput::Speech(request) => self.speak(request, workspace).await,
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn read_output(path: &Path) -> Result<Vec<u8>, BackendError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BackendError::Inference(
            format!("backend produced no output at {}", path.display()),
        )),
        Err(e) => Err(e.into()),
    }
}
