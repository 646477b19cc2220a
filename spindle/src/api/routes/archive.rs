//! Directory-to-ZIP archive responses.
//!
//! Archives are flat: every audio file directly inside the directory becomes
//! a top-level entry, with no parent-directory entry. Built in memory;
//! playlist directories hold at most a few hundred audio files.

use std::io::{Read, Write};
use std::path::Path;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::api::error::ApiError;

/// Build a flat ZIP of the files directly inside `dir`.
pub fn build_archive_zip(dir: &Path) -> Result<Vec<u8>, ApiError> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(&mut cursor);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let entries = std::fs::read_dir(dir)
        .map_err(|e| ApiError::internal(format!("Failed to read directory: {e}")))?;

    let mut wrote_any = false;
    for entry in entries {
        let entry = entry.map_err(|e| ApiError::internal(format!("Failed to read entry: {e}")))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        zip.start_file(name, options)
            .map_err(|e| ApiError::internal(format!("Failed to add zip entry: {e}")))?;

        let mut file = std::fs::File::open(&path)
            .map_err(|e| ApiError::internal(format!("Failed to open file: {e}")))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| ApiError::internal(format!("Failed to read file: {e}")))?;
        zip.write_all(&buf)
            .map_err(|e| ApiError::internal(format!("Failed to write zip entry: {e}")))?;
        wrote_any = true;
    }

    zip.finish()
        .map_err(|e| ApiError::internal(format!("Failed to finish zip: {e}")))?;

    if !wrote_any {
        return Err(ApiError::not_found("No downloaded content to archive"));
    }

    Ok(cursor.into_inner())
}

/// Wrap ZIP bytes in a download response.
pub fn zip_response(filename: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
