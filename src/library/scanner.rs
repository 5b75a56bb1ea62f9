//! Filesystem-backed catalog
//!
//! Without a document store the media root is the catalog: every immediate
//! subdirectory of `<media_root>/<media_type>` is one title.

use std::path::{Path, PathBuf};

use super::catalog::{Catalog, Listing};
use super::entry::{media_dir, MediaIndexEntry, MediaType, MetadataUpdate};
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct FilesystemCatalog {
    media_root: PathBuf,
}

impl FilesystemCatalog {
    pub fn new(media_root: PathBuf) -> Self {
        Self { media_root }
    }

    /// Names of the immediate subdirectories of `dir`, sorted
    pub async fn list_directories(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        names.sort();
        Ok(names)
    }
}

#[async_trait::async_trait]
impl Catalog for FilesystemCatalog {
    fn backend(&self) -> &'static str {
        "filesystem"
    }

    async fn add(&self, entry: &MediaIndexEntry) -> Result<()> {
        // The extracted directory is the record.
        tracing::debug!(title = %entry.title, location = %entry.location, "Filesystem catalog entry");
        Ok(())
    }

    async fn list(&self, media_type: MediaType) -> Result<Listing> {
        let dir = self.media_root.join(media_type.as_str());
        let names = Self::list_directories(&dir).await?;
        Ok(Listing::Directories(names))
    }

    async fn remove(&self, media_type: MediaType, title: &str) -> Result<PathBuf> {
        Ok(media_dir(&self.media_root, media_type, title))
    }

    async fn update_metadata(
        &self,
        _media_type: MediaType,
        _prior_title: &str,
        _update: &MetadataUpdate,
    ) -> Result<u64> {
        Err(AppError::Unsupported(
            "metadata updates require a document store".to_string(),
        ))
    }
}
