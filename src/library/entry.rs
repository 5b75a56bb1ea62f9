//! Media catalog types

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of media, one collection each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }

    pub fn all() -> [MediaType; 2] {
        [MediaType::Video, MediaType::Audio]
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid media type: {0}")]
pub struct InvalidMediaType(pub String);

impl FromStr for MediaType {
    type Err = InvalidMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(MediaType::Video),
            "audio" => Ok(MediaType::Audio),
            other => Err(InvalidMediaType(other.to_string())),
        }
    }
}

/// A catalog record for one extracted upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaIndexEntry {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub directory: String,
    /// Extraction directory, assigned by the server
    pub location: String,
    pub media_type: MediaType,
}

/// Client-supplied metadata sent with every chunk
///
/// The web client sends PascalCase keys, other clients camelCase; both are
/// accepted. `location` is never read from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadMetadata {
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(default, alias = "Genre")]
    pub genre: Vec<String>,
    #[serde(default, alias = "Tags")]
    pub tags: Vec<String>,
    #[serde(default, alias = "Directory")]
    pub directory: String,
    #[serde(rename = "mediaType", alias = "MediaType")]
    pub media_type: String,
}

impl UploadMetadata {
    /// Build the catalog entry once the archive has been extracted
    pub fn into_entry(self, media_type: MediaType, location: &Path) -> MediaIndexEntry {
        MediaIndexEntry {
            title: self.title,
            description: self.description,
            genre: non_empty(self.genre),
            tags: non_empty(self.tags),
            directory: self.directory,
            location: location.to_string_lossy().to_string(),
            media_type,
        }
    }
}

/// Replacement metadata; `location` is deliberately absent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataUpdate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub directory: String,
}

fn non_empty(values: Vec<String>) -> BTreeSet<String> {
    values.into_iter().filter(|v| !v.is_empty()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid title: {0:?}")]
pub struct InvalidTitle(pub String);

/// Reject titles that cannot be used as a single path segment
pub fn validate_title(title: &str) -> Result<&str, InvalidTitle> {
    let bad = title.trim().is_empty()
        || title.starts_with('.')
        || title.contains(['/', '\\', '\0'])
        || Path::new(title).components().count() != 1;

    if bad {
        return Err(InvalidTitle(title.to_string()));
    }
    Ok(title)
}

/// `<media_root>/<media_type>/<title>`
pub fn media_dir(media_root: &Path, media_type: MediaType, title: &str) -> PathBuf {
    media_root.join(media_type.as_str()).join(title)
}
