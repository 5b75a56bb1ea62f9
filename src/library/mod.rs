//! Media library
//!
//! Ties the chunk assembler, archive extraction and the catalog together.
//! An upload moves through
//! `receiving chunk -> assembling -> extracting -> cataloging -> done`;
//! any failure stops it without leaving a catalog entry behind.

mod catalog;
mod entry;
mod scanner;
mod store;

pub use catalog::{Catalog, Listing};
pub use entry::{
    media_dir, validate_title, InvalidMediaType, InvalidTitle, MediaIndexEntry, MediaType,
    MetadataUpdate, UploadMetadata,
};
pub use scanner::FilesystemCatalog;
pub use store::StoreCatalog;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::upload::{extract_archive, ChunkAssembler, ChunkOutcome, ChunkUpload, UploadError};

/// Outcome of one upload request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    ChunkReceived,
    Complete(MediaIndexEntry),
}

#[derive(Clone)]
pub struct MediaLibrary {
    inner: Arc<MediaLibraryInner>,
}

struct MediaLibraryInner {
    media_root: PathBuf,
    assembler: ChunkAssembler,
    catalog: Arc<dyn Catalog>,
}

impl MediaLibrary {
    pub fn new(media_root: PathBuf, assembler: ChunkAssembler, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            inner: Arc::new(MediaLibraryInner {
                media_root,
                assembler,
                catalog,
            }),
        }
    }

    pub fn assembler(&self) -> &ChunkAssembler {
        &self.inner.assembler
    }

    pub fn catalog_backend(&self) -> &'static str {
        self.inner.catalog.backend()
    }

    /// Create the per-type media directories and the staging root
    pub async fn ensure_layout(&self) -> std::io::Result<()> {
        for media_type in MediaType::all() {
            tokio::fs::create_dir_all(self.inner.media_root.join(media_type.as_str())).await?;
        }
        tokio::fs::create_dir_all(self.inner.assembler.staging_root()).await
    }

    fn archive_path(&self, media_type: MediaType, title: &str) -> PathBuf {
        self.inner
            .media_root
            .join(media_type.as_str())
            .join(format!("{}.zip", title))
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Stage one chunk; on the last one extract and catalog the upload
    pub async fn receive_upload(
        &self,
        metadata: UploadMetadata,
        chunk: ChunkUpload,
    ) -> Result<UploadStatus> {
        let media_type: MediaType = metadata
            .media_type
            .parse()
            .map_err(|e: InvalidMediaType| AppError::BadRequest(e.to_string()))?;
        let title = validate_title(&metadata.title)
            .map_err(|e| AppError::BadRequest(e.to_string()))?
            .to_string();

        let dest = media_dir(&self.inner.media_root, media_type, &title);
        if tokio::fs::try_exists(&dest).await? {
            self.inner.assembler.discard(media_type, &title).await?;
            return Err(AppError::Conflict(format!(
                "{} \"{}\" already exists",
                media_type, title
            )));
        }

        let archive = self.archive_path(media_type, &title);
        let outcome = self
            .inner
            .assembler
            .receive_chunk(media_type, &title, chunk, &archive)
            .await?;

        let archive = match outcome {
            ChunkOutcome::Received { .. } => return Ok(UploadStatus::ChunkReceived),
            ChunkOutcome::Complete { archive } => archive,
        };

        let extracted = extract_archive(archive.clone(), dest.clone()).await;
        if let Err(e) = tokio::fs::remove_file(&archive).await {
            tracing::warn!(archive = %archive.display(), error = %e, "Failed to remove archive");
        }
        let stats = match extracted {
            Ok(stats) => stats,
            Err(e) => {
                remove_partial(&dest).await;
                return Err(UploadError::from(e).into());
            }
        };

        let entry = metadata.into_entry(media_type, &dest);
        if let Err(e) = self.inner.catalog.add(&entry).await {
            // No record, no directory
            remove_partial(&dest).await;
            return Err(e);
        }

        tracing::info!(
            media_type = %media_type,
            title = %entry.title,
            location = %entry.location,
            files = stats.files,
            bytes = stats.bytes,
            "Upload complete"
        );

        Ok(UploadStatus::Complete(entry))
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub async fn list(&self, media_type: MediaType) -> Result<Listing> {
        let listing = self.inner.catalog.list(media_type).await?;
        tracing::debug!(media_type = %media_type, count = listing.len(), "Listed catalog");
        Ok(listing)
    }

    /// Remove the catalog entry, then the media directory
    pub async fn delete(&self, media_type: MediaType, title: &str) -> Result<()> {
        let title = validate_title(title).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let location = self.inner.catalog.remove(media_type, title).await?;
        if !location.starts_with(&self.inner.media_root) {
            return Err(AppError::Internal(format!(
                "refusing to delete {} outside the media root",
                location.display()
            )));
        }

        tracing::info!(media_type = %media_type, title = %title, location = %location.display(), "Deleting media directory");
        tokio::fs::remove_dir_all(&location).await?;

        Ok(())
    }

    pub async fn update_metadata(
        &self,
        media_type: MediaType,
        prior_title: &str,
        update: &MetadataUpdate,
    ) -> Result<u64> {
        validate_title(&update.title).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let modified = self
            .inner
            .catalog
            .update_metadata(media_type, prior_title, update)
            .await?;

        tracing::info!(
            media_type = %media_type,
            prior_title = %prior_title,
            title = %update.title,
            modified = modified,
            "Metadata updated"
        );

        Ok(modified)
    }
}

/// Remove a media directory left behind by a failed upload
async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_dir_all(dest).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::error!(
            location = %dest.display(),
            error = %e,
            "Failed to remove uncataloged media directory"
        ),
    }
}
