//! Handlers for lip-sync and text-to-speech.

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use infergate_core::media::{MediaFile, SpeechRequest};

use crate::error::{AppError, AppResult};
use crate::response::MediaResponse;
use crate::state::AppState;

/// POST /sync
///
/// Accepts a multipart form with `video` and `audio` file parts and returns
/// the synchronized video as an attachment. Unknown parts are ignored.
pub async fn sync_media(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<MediaResponse> {
    let mut multipart = multipart?;
    let mut video: Option<MediaFile> = None;
    let mut audio: Option<MediaFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "video" => video = Some(read_file(field).await?),
            "audio" => audio = Some(read_file(field).await?),
            _ => {}
        }
    }

    let done = state.facade.sync_media(video, audio).await?;
    tracing::info!(
        job_id = %done.job_id,
        bytes = done.output.bytes.len(),
        "Media sync finished",
    );
    Ok(MediaResponse(done.output))
}

/// POST /tts
pub async fn synthesize_speech(
    State(state): State<AppState>,
    payload: Result<Json<SpeechRequest>, JsonRejection>,
) -> AppResult<MediaResponse> {
    let Json(request) = payload?;
    let done = state.facade.synthesize_speech(request).await?;
    tracing::info!(
        job_id = %done.job_id,
        bytes = done.output.bytes.len(),
        "Speech synthesis finished",
    );
    Ok(MediaResponse(done.output))
}

async fn read_file(field: Field<'_>) -> AppResult<MediaFile> {
    let file_name = field.file_name().map(str::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(MediaFile {
        file_name,
        bytes: bytes.to_vec(),
    })
}
