//! Media sync and speech synthesis inputs, plus the binary payload returned
//! by both.

use serde::Deserialize;

use crate::error::CoreError;

pub const VIDEO_MP4: &str = "video/mp4";
pub const AUDIO_WAV: &str = "audio/wav";

/// Download name for a lip-synced video.
pub const SYNCED_VIDEO_FILE_NAME: &str = "synchronized_video.mp4";

/// An uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Primary video plus the audio track it should be synced to.
#[derive(Debug, Clone)]
pub struct MediaSyncRequest {
    pub video: MediaFile,
    pub audio: MediaFile,
}

impl MediaSyncRequest {
    /// Build a request from the parts found in an upload.
    ///
    /// Both parts must be present and non-empty.
    pub fn from_parts(
        video: Option<MediaFile>,
        audio: Option<MediaFile>,
    ) -> Result<Self, CoreError> {
        let (Some(video), Some(audio)) = (video, audio) else {
            return Err(CoreError::Validation(
                "Both video and audio files are required".to_string(),
            ));
        };
        if video.bytes.is_empty() {
            return Err(CoreError::Validation("Video file is empty".to_string()));
        }
        if audio.bytes.is_empty() {
            return Err(CoreError::Validation("Audio file is empty".to_string()));
        }
        Ok(Self { video, audio })
    }
}

/// Text to be spoken.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: String,
}

impl SpeechRequest {
    pub fn validate(self) -> Result<Self, CoreError> {
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation("Empty text provided".to_string()));
        }
        Ok(self)
    }
}

/// Binary output handed back to the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Suggested attachment name, if the response should be a download.
    pub file_name: Option<String>,
}
