//! Archive extraction
//!
//! Expands an assembled ZIP archive into a media directory. Entries whose
//! names would resolve outside the destination abort the extraction; the
//! caller removes whatever was written before the error.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Unsafe entry path in archive: {0}")]
    UnsafePath(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Summary of a finished extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// Extract `archive` into `dest` on the blocking pool
pub async fn extract_archive(archive: PathBuf, dest: PathBuf) -> Result<ExtractStats, ExtractError> {
    tokio::task::spawn_blocking(move || extract_to(&archive, &dest))
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))?
}

/// Extract every entry of `archive` relative to `dest`
pub fn extract_to(archive: &Path, dest: &Path) -> Result<ExtractStats, ExtractError> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;
    let mut stats = ExtractStats::default();

    fs::create_dir_all(dest)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;

        // Rejects absolute paths and `..` components
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExtractError::UnsafePath(entry.name().to_string()))?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            stats.directories += 1;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = File::create(&out_path)?;
        stats.bytes += io::copy(&mut entry, &mut out_file)?;
        stats.files += 1;

        apply_mode(&out_path, entry.unix_mode())?;
    }

    Ok(stats)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: Option<u32>) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) => fs::set_permissions(path, fs::Permissions::from_mode(mode)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: Option<u32>) -> io::Result<()> {
    Ok(())
}
