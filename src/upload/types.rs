//! Upload types for chunked archive uploads

use std::path::PathBuf;

use axum::http::StatusCode;

use super::extract::ExtractError;

/// One chunk as received from the client
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub index: usize,
    pub total: usize,
    pub data: Vec<u8>,
}

/// Result of staging a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More chunks are expected
    Received { received: usize, total: usize },
    /// All chunks were present and the archive has been assembled
    Complete { archive: PathBuf },
}

/// Upload error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Chunk information missing")]
    MissingChunkInfo,

    #[error("Total chunk count must be at least 1")]
    InvalidChunkCount,

    #[error("Chunk index out of bounds: {index} (total: {total})")]
    ChunkIndexOutOfBounds { index: usize, total: usize },

    #[error("Chunk {0} missing at assembly")]
    MissingChunk(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractError),
}

impl UploadError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingChunkInfo => StatusCode::BAD_REQUEST,
            Self::InvalidChunkCount => StatusCode::BAD_REQUEST,
            Self::ChunkIndexOutOfBounds { .. } => StatusCode::BAD_REQUEST,
            Self::MissingChunk(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
