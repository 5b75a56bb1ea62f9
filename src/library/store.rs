//! Store-backed catalog

use std::path::PathBuf;

use sqlx::SqlitePool;

use super::catalog::{Catalog, Listing};
use super::entry::{MediaIndexEntry, MediaType, MetadataUpdate};
use crate::db::MediaRepository;
use crate::error::{AppError, Result};

/// Catalog kept in the SQLite document store
#[derive(Clone)]
pub struct StoreCatalog {
    pool: SqlitePool,
}

impl StoreCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Catalog for StoreCatalog {
    fn backend(&self) -> &'static str {
        "store"
    }

    async fn add(&self, entry: &MediaIndexEntry) -> Result<()> {
        MediaRepository::new(&self.pool)
            .insert(entry)
            .await
            .map_err(|e| AppError::Store(format!("failed to insert entry: {}", e)))
    }

    async fn list(&self, media_type: MediaType) -> Result<Listing> {
        let entries = MediaRepository::new(&self.pool).list(media_type).await?;
        Ok(Listing::Entries(entries))
    }

    async fn remove(&self, media_type: MediaType, title: &str) -> Result<PathBuf> {
        let deleted = MediaRepository::new(&self.pool)
            .delete(media_type, title)
            .await?
            .ok_or_else(|| AppError::Store(format!("failed to delete entry: {}", title)))?;

        Ok(PathBuf::from(deleted.location))
    }

    async fn update_metadata(
        &self,
        media_type: MediaType,
        prior_title: &str,
        update: &MetadataUpdate,
    ) -> Result<u64> {
        MediaRepository::new(&self.pool)
            .update_metadata(media_type, prior_title, update)
            .await
    }
}
