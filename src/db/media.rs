//! Media catalog database operations

use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{AppError, Result};
use crate::library::{MediaIndexEntry, MediaType, MetadataUpdate};

/// Catalog row; `genre` and `tags` are JSON arrays
#[derive(Debug, Clone, sqlx::FromRow)]
struct MediaRow {
    media_type: String,
    title: String,
    description: String,
    genre: String,
    tags: String,
    directory: String,
    location: String,
}

impl MediaRow {
    fn into_entry(self) -> Result<MediaIndexEntry> {
        let media_type = self
            .media_type
            .parse::<MediaType>()
            .map_err(|e| AppError::Store(e.to_string()))?;

        Ok(MediaIndexEntry {
            title: self.title,
            description: self.description,
            genre: decode_set(&self.genre)?,
            tags: decode_set(&self.tags)?,
            directory: self.directory,
            location: self.location,
            media_type,
        })
    }
}

fn encode_set(values: &BTreeSet<String>) -> Result<String> {
    serde_json::to_string(values).map_err(|e| AppError::Store(e.to_string()))
}

fn decode_set(raw: &str) -> Result<BTreeSet<String>> {
    serde_json::from_str(raw).map_err(|e| AppError::Store(format!("corrupt set column: {}", e)))
}

/// Media repository
pub struct MediaRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MediaRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new entry; duplicate titles within a media type fail
    pub async fn insert(&self, entry: &MediaIndexEntry) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO media_entries (media_type, title, description, genre, tags, directory, location, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.media_type.as_str())
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(encode_set(&entry.genre)?)
        .bind(encode_set(&entry.tags)?)
        .bind(&entry.directory)
        .bind(&entry.location)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Get one entry
    #[cfg(test)]
    pub async fn get(&self, media_type: MediaType, title: &str) -> Result<Option<MediaIndexEntry>> {
        let row = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT media_type, title, description, genre, tags, directory, location
            FROM media_entries
            WHERE media_type = ? AND title = ?
            "#,
        )
        .bind(media_type.as_str())
        .bind(title)
        .fetch_optional(self.pool)
        .await?;

        row.map(MediaRow::into_entry).transpose()
    }

    /// List all entries of one media type
    pub async fn list(&self, media_type: MediaType) -> Result<Vec<MediaIndexEntry>> {
        let rows = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT media_type, title, description, genre, tags, directory, location
            FROM media_entries
            WHERE media_type = ?
            ORDER BY created_at ASC, title ASC
            "#,
        )
        .bind(media_type.as_str())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(MediaRow::into_entry).collect()
    }

    /// Delete an entry and return what was removed
    pub async fn delete(&self, media_type: MediaType, title: &str) -> Result<Option<MediaIndexEntry>> {
        let row = sqlx::query_as::<_, MediaRow>(
            r#"
            DELETE FROM media_entries
            WHERE media_type = ? AND title = ?
            RETURNING media_type, title, description, genre, tags, directory, location
            "#,
        )
        .bind(media_type.as_str())
        .bind(title)
        .fetch_optional(self.pool)
        .await?;

        row.map(MediaRow::into_entry).transpose()
    }

    /// Replace the editable fields of the entry titled `prior_title`
    ///
    /// `location` is never touched. Returns the number of rows modified.
    pub async fn update_metadata(
        &self,
        media_type: MediaType,
        prior_title: &str,
        update: &MetadataUpdate,
    ) -> Result<u64> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE media_entries
            SET title = ?, description = ?, genre = ?, tags = ?, directory = ?, updated_at = ?
            WHERE media_type = ? AND title = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.description)
        .bind(encode_set(&update.genre)?)
        .bind(encode_set(&update.tags)?)
        .bind(&update.directory)
        .bind(&now)
        .bind(media_type.as_str())
        .bind(prior_title)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use tempfile::TempDir;

    async fn test_pool(temp_dir: &TempDir) -> SqlitePool {
        let url = format!("sqlite://{}", temp_dir.path().join("catalog.db").display());
        create_pool(&url).await.unwrap()
    }

    fn entry(title: &str, media_type: MediaType) -> MediaIndexEntry {
        MediaIndexEntry {
            title: title.to_string(),
            description: "desc".to_string(),
            genre: ["Drama".to_string()].into_iter().collect(),
            tags: ["x".to_string(), "y".to_string()].into_iter().collect(),
            directory: "films".to_string(),
            location: format!("media/{}/{}", media_type, title),
            media_type,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_pool(&temp_dir).await;
        let repo = MediaRepository::new(&pool);

        repo.insert(&entry("Movie", MediaType::Video)).await.unwrap();
        repo.insert(&entry("Song", MediaType::Audio)).await.unwrap();

        let videos = repo.list(MediaType::Video).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0], entry("Movie", MediaType::Video));

        let audio = repo.list(MediaType::Audio).await.unwrap();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].title, "Song");
    }

    #[tokio::test]
    async fn test_duplicate_title_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_pool(&temp_dir).await;
        let repo = MediaRepository::new(&pool);

        repo.insert(&entry("Movie", MediaType::Video)).await.unwrap();
        assert!(repo.insert(&entry("Movie", MediaType::Video)).await.is_err());
        // Same title in the other collection is fine
        repo.insert(&entry("Movie", MediaType::Audio)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_is_scoped_by_media_type() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_pool(&temp_dir).await;
        let repo = MediaRepository::new(&pool);

        repo.insert(&entry("Shared", MediaType::Video)).await.unwrap();
        repo.insert(&entry("Shared", MediaType::Audio)).await.unwrap();

        let deleted = repo.delete(MediaType::Audio, "Shared").await.unwrap();
        assert_eq!(deleted.unwrap().location, "media/audio/Shared");

        assert!(repo.get(MediaType::Video, "Shared").await.unwrap().is_some());
        assert!(repo.delete(MediaType::Audio, "Shared").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_preserves_location() {
        let temp_dir = TempDir::new().unwrap();
        let pool = test_pool(&temp_dir).await;
        let repo = MediaRepository::new(&pool);

        repo.insert(&entry("Movie", MediaType::Video)).await.unwrap();

        let update = MetadataUpdate {
            title: "Movie (Director's Cut)".to_string(),
            description: "longer".to_string(),
            genre: BTreeSet::new(),
            tags: ["z".to_string()].into_iter().collect(),
            directory: "classics".to_string(),
        };

        let modified = repo
            .update_metadata(MediaType::Video, "Movie", &update)
            .await
            .unwrap();
        assert_eq!(modified, 1);

        let updated = repo
            .get(MediaType::Video, "Movie (Director's Cut)")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.location, "media/video/Movie");
        assert_eq!(updated.tags.into_iter().collect::<Vec<_>>(), vec!["z"]);
        assert_eq!(updated.directory, "classics");

        let missing = repo
            .update_metadata(MediaType::Video, "Nope", &update)
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }
}
