//! Catalog abstraction
//!
//! The library keeps its index either in the document store or, when no
//! store is configured, implicitly in the media directory layout.

use serde::Serialize;

use super::entry::{MediaIndexEntry, MediaType, MetadataUpdate};
use crate::error::Result;

/// What `/dir/` returns: full entries from a store, bare directory names
/// from the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    Entries(Vec<MediaIndexEntry>),
    Directories(Vec<String>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Listing::Entries(entries) => entries.len(),
            Listing::Directories(names) => names.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Titles in listing order
    pub fn titles(&self) -> Vec<&str> {
        match self {
            Listing::Entries(entries) => entries.iter().map(|e| e.title.as_str()).collect(),
            Listing::Directories(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Trait for catalog backends
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Short backend name for logs and `/health`
    fn backend(&self) -> &'static str;

    /// Record a freshly extracted upload
    async fn add(&self, entry: &MediaIndexEntry) -> Result<()>;

    /// Everything of one media type
    async fn list(&self, media_type: MediaType) -> Result<Listing>;

    /// Forget `title` and return the directory that held its media
    async fn remove(&self, media_type: MediaType, title: &str) -> Result<std::path::PathBuf>;

    /// Replace editable metadata; returns the number of entries modified
    async fn update_metadata(
        &self,
        media_type: MediaType,
        prior_title: &str,
        update: &MetadataUpdate,
    ) -> Result<u64>;
}
