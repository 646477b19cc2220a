//! Filesystem helpers shared across modules.
//!
//! These helpers provide consistent error context (operation + path) and
//! implement the directory scan backing download-status reconciliation.

use std::path::Path;

use crate::{Error, Result};

/// Audio file extensions the downloader is known to produce.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "ogg", "opus", "wav", "aac"];

/// Convert an IO error into an application error with operation + path context.
pub fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::io_path(op, path, source)
}

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| io_error("creating directory", path, e))
}

/// List the audio file names (not paths) directly inside `dir`.
///
/// A missing directory yields an empty list rather than an error: a playlist
/// that has never synced simply has no content yet. Subdirectories and
/// non-audio files (caches, partial downloads) are skipped.
pub async fn list_audio_files(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error("scanning directory", dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error("scanning directory", dir, e))?
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                AUDIO_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if !is_audio {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push(name.to_string());
        }
    }

    Ok(files)
}

/// Delete a directory tree and recreate it empty.
///
/// A missing directory is not an error; the recreate still runs so callers
/// always end up with an existing, empty directory.
pub async fn clear_directory(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_error("removing directory", dir, e)),
    }
    ensure_dir_all(dir).await
}

/// Delete a directory tree without recreating it.
pub async fn remove_directory(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("removing directory", dir, e)),
    }
}
