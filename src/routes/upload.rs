//! Upload Routes
//!
//! `POST /upload/` takes one chunk of a ZIP archive per request as a
//! multipart form:
//! - `metadata`: JSON `{title, description, genre[], tags[], directory, mediaType}`
//! - `file`: the chunk bytes
//! - `chunkIndex`, `totalChunks`: position of this chunk
//!
//! The response body is `Chunk received` until the last chunk, which
//! answers `Upload complete` once the archive is extracted and cataloged.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Router,
};

use crate::error::{AppError, Result};
use crate::library::{UploadMetadata, UploadStatus};
use crate::state::AppState;
use crate::upload::{ChunkUpload, UploadError};

pub const CHUNK_RECEIVED: &str = "Chunk received";
pub const UPLOAD_COMPLETE: &str = "Upload complete";

/// Create the upload router; `max_chunk_bytes` caps a single request body
pub fn router(max_chunk_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload/", post(upload_chunk))
        .layer(DefaultBodyLimit::max(max_chunk_bytes))
}

/// Raw form fields before validation
#[derive(Default)]
struct UploadForm {
    metadata: Option<String>,
    file: Option<Vec<u8>>,
    chunk_index: Option<String>,
    total_chunks: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Unable to parse form: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let invalid = |e: axum::extract::multipart::MultipartError| {
                AppError::BadRequest(format!("Unable to read field {}: {}", name, e))
            };

            match name.as_str() {
                "metadata" => form.metadata = Some(field.text().await.map_err(invalid)?),
                "file" => form.file = Some(field.bytes().await.map_err(invalid)?.to_vec()),
                "chunkIndex" => form.chunk_index = Some(field.text().await.map_err(invalid)?),
                "totalChunks" => form.total_chunks = Some(field.text().await.map_err(invalid)?),
                _ => {}
            }
        }

        Ok(form)
    }

    fn into_parts(self) -> Result<(UploadMetadata, ChunkUpload)> {
        let metadata = self
            .metadata
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::BadRequest("Metadata not found in form data".to_string()))?;
        let metadata: UploadMetadata = serde_json::from_str(&metadata)
            .map_err(|e| AppError::BadRequest(format!("Invalid metadata JSON: {}", e)))?;

        let data = self
            .file
            .ok_or_else(|| AppError::BadRequest("Error retrieving the file".to_string()))?;

        let index = parse_count(self.chunk_index.as_deref())?;
        let total = parse_count(self.total_chunks.as_deref())?;

        Ok((metadata, ChunkUpload { index, total, data }))
    }
}

fn parse_count(raw: Option<&str>) -> Result<usize> {
    raw.and_then(|v| v.trim().parse().ok())
        .ok_or(AppError::Upload(UploadError::MissingChunkInfo))
}

/// POST /upload/
pub async fn upload_chunk(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<&'static str> {
    let (metadata, chunk) = UploadForm::read(multipart).await?.into_parts()?;

    tracing::debug!(
        title = %metadata.title,
        media_type = %metadata.media_type,
        chunk_index = chunk.index,
        total_chunks = chunk.total,
        size = chunk.data.len(),
        "Chunk upload"
    );

    match state.library().receive_upload(metadata, chunk).await? {
        UploadStatus::ChunkReceived => Ok(CHUNK_RECEIVED),
        UploadStatus::Complete(_) => Ok(UPLOAD_COMPLETE),
    }
}
