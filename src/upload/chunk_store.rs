//! Chunk Store
//!
//! Stages numbered chunks on the local filesystem and reassembles them into
//! a single archive once every chunk of an upload is present.
//!
//! Layout: `<staging_root>/<media_type>/<title>/chunk-<index>`, plus a
//! `total` file with the chunk count the upload declared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;

use super::types::{ChunkOutcome, ChunkUpload, UploadError};
use crate::library::MediaType;

const CHUNK_PREFIX: &str = "chunk-";

/// Holds the declared chunk count; rewritten on every chunk
const MANIFEST_FILE: &str = "total";

// ============================================================================
// Chunk Assembler
// ============================================================================

/// Stages chunks per `(media_type, title)` and assembles them exactly once
#[derive(Clone)]
pub struct ChunkAssembler {
    inner: Arc<ChunkAssemblerInner>,
}

struct ChunkAssemblerInner {
    staging_root: PathBuf,

    /// One async lock per in-flight upload; staging, counting and assembly
    /// for the same title run under it.
    locks: Mutex<HashMap<(MediaType, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl ChunkAssembler {
    pub fn new(staging_root: PathBuf) -> Self {
        Self {
            inner: Arc::new(ChunkAssemblerInner {
                staging_root,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.inner.staging_root
    }

    /// Staging directory for one upload
    pub fn staging_dir(&self, media_type: MediaType, title: &str) -> PathBuf {
        self.inner
            .staging_root
            .join(media_type.as_str())
            .join(title)
    }

    fn chunk_path(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{}{}", CHUNK_PREFIX, index))
    }

    fn lock_for(&self, media_type: MediaType, title: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.locks.lock();
        locks
            .entry((media_type, title.to_string()))
            .or_default()
            .clone()
    }

    /// Drop the map entry unless another request is waiting on `lock`
    fn release_lock(&self, media_type: MediaType, title: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.inner.locks.lock();
        // One reference in the map, one held by the caller
        if Arc::strong_count(lock) <= 2 {
            locks.remove(&(media_type, title.to_string()));
        }
    }

    /// Persist one chunk and assemble the archive if it was the last one
    ///
    /// `title` must already be validated as a single path segment.
    pub async fn receive_chunk(
        &self,
        media_type: MediaType,
        title: &str,
        chunk: ChunkUpload,
        archive_path: &Path,
    ) -> Result<ChunkOutcome, UploadError> {
        if chunk.total == 0 {
            return Err(UploadError::InvalidChunkCount);
        }
        if chunk.index >= chunk.total {
            return Err(UploadError::ChunkIndexOutOfBounds {
                index: chunk.index,
                total: chunk.total,
            });
        }

        let lock = self.lock_for(media_type, title);
        let guard = lock.lock().await;

        let result = self
            .stage_chunk(media_type, title, &chunk, archive_path)
            .await;

        if !matches!(result, Ok(ChunkOutcome::Received { .. })) {
            drop(guard);
            self.release_lock(media_type, title, &lock);
        }

        result
    }

    /// Staging, counting and assembly; runs under the upload's lock
    async fn stage_chunk(
        &self,
        media_type: MediaType,
        title: &str,
        chunk: &ChunkUpload,
        archive_path: &Path,
    ) -> Result<ChunkOutcome, UploadError> {
        let dir = self.staging_dir(media_type, title);

        // Leftovers of an abandoned upload declared a different chunk count
        if let Some(staged_total) = read_manifest(&dir).await? {
            if staged_total != chunk.total {
                tracing::warn!(
                    media_type = %media_type,
                    title = %title,
                    staged_total = staged_total,
                    total_chunks = chunk.total,
                    "Discarding stale staged chunks"
                );
                tokio::fs::remove_dir_all(&dir).await?;
            }
        }

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(MANIFEST_FILE), chunk.total.to_string()).await?;
        tokio::fs::write(Self::chunk_path(&dir, chunk.index), &chunk.data).await?;

        let received = count_chunks(&dir, chunk.total).await?;

        tracing::debug!(
            media_type = %media_type,
            title = %title,
            chunk_index = chunk.index,
            chunks_received = received,
            total_chunks = chunk.total,
            "Chunk staged"
        );

        if received < chunk.total {
            return Ok(ChunkOutcome::Received {
                received,
                total: chunk.total,
            });
        }

        tracing::info!(
            media_type = %media_type,
            title = %title,
            chunks = chunk.total,
            archive = %archive_path.display(),
            "Assembling archive from chunks"
        );

        let assembled = assemble_chunks(&dir, chunk.total, archive_path).await;

        // Staging is discarded whether or not assembly worked; no retry.
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove staging directory");
        }

        if let Err(e) = assembled {
            let _ = tokio::fs::remove_file(archive_path).await;
            return Err(e);
        }

        Ok(ChunkOutcome::Complete {
            archive: archive_path.to_path_buf(),
        })
    }

    /// Remove a staging directory without assembling
    pub async fn discard(&self, media_type: MediaType, title: &str) -> Result<bool, UploadError> {
        let dir = self.staging_dir(media_type, title);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Remove staging directories idle for longer than `max_age`
    ///
    /// Uploads currently holding their lock are skipped. Returns the number
    /// of directories removed.
    pub async fn purge_stale(&self, max_age: Duration) -> Result<usize, UploadError> {
        let mut purged = 0;

        for media_type in MediaType::all() {
            let type_dir = self.inner.staging_root.join(media_type.as_str());
            let mut entries = match tokio::fs::read_dir(&type_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                let Some(title) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };

                let idle = last_activity(&entry.path())
                    .await?
                    .elapsed()
                    .unwrap_or_default();
                if idle < max_age {
                    continue;
                }

                let lock = self.lock_for(media_type, &title);
                let Ok(guard) = lock.try_lock() else {
                    continue;
                };

                let removed = self.discard(media_type, &title).await;
                drop(guard);
                self.release_lock(media_type, &title, &lock);

                if removed? {
                    tracing::info!(
                        media_type = %media_type,
                        title = %title,
                        idle_secs = idle.as_secs(),
                        "Purged abandoned upload"
                    );
                    purged += 1;
                }
            }
        }

        Ok(purged)
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self, max_age: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // 5 minutes

            loop {
                interval.tick().await;
                match self.purge_stale(max_age).await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(count = count, "Purged abandoned uploads"),
                    Err(e) => tracing::warn!(error = %e, "Staging cleanup failed"),
                }
            }
        })
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.inner.locks.lock().len()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_chunk_index(name: &str) -> Option<usize> {
    name.strip_prefix(CHUNK_PREFIX)?.parse().ok()
}

/// Chunk count recorded by an earlier request, if any
async fn read_manifest(dir: &Path) -> Result<Option<usize>, UploadError> {
    match tokio::fs::read_to_string(dir.join(MANIFEST_FILE)).await {
        // Unreadable counts are treated as a mismatch
        Ok(raw) => Ok(Some(raw.trim().parse().unwrap_or(0))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Time of the last staged chunk, falling back to the directory itself
async fn last_activity(dir: &Path) -> Result<SystemTime, UploadError> {
    let metadata = match tokio::fs::metadata(dir.join(MANIFEST_FILE)).await {
        Ok(metadata) => metadata,
        Err(_) => tokio::fs::metadata(dir).await?,
    };
    Ok(metadata.modified()?)
}

/// Count staged chunk files with an index below `total`
async fn count_chunks(dir: &Path, total: usize) -> Result<usize, UploadError> {
    let mut count = 0;
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let in_range = name
            .to_str()
            .and_then(parse_chunk_index)
            .is_some_and(|index| index < total);
        if in_range {
            count += 1;
        }
    }

    Ok(count)
}

/// Concatenate `chunk-0 .. chunk-{total-1}` into `archive_path`
async fn assemble_chunks(dir: &Path, total: usize, archive_path: &Path) -> Result<u64, UploadError> {
    if let Some(parent) = archive_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut output = tokio::fs::File::create(archive_path).await?;
    let mut written = 0;

    for index in 0..total {
        let mut chunk = match tokio::fs::File::open(ChunkAssembler::chunk_path(dir, index)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::MissingChunk(index));
            }
            Err(e) => return Err(e.into()),
        };
        written += tokio::io::copy(&mut chunk, &mut output).await?;
    }

    output.flush().await?;
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================
