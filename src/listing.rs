//! Directory Lister: turns a filesystem path into a browsable listing.
//!
//! Listings are recomputed on every request and never cached.

use std::fs;

use crate::error::{AppError, AppResult};
use crate::protocol::{FileEntry, Listing};

/// Enumerate the immediate children of `path`.
///
/// `path` must end with a separator so that child names can be appended
/// directly. Hidden (dot-prefixed) entries are excluded; everything else is
/// classified by its metadata (symlinks are followed). Directories and files
/// are sorted independently, case-insensitively ascending, never merged.
pub fn scan(path: &str) -> AppResult<Listing> {
    if path.is_empty() || !path.ends_with('/') {
        return Err(AppError::BadRequest(format!(
            "Directory path must end with a separator: {}",
            path
        )));
    }

    let mut directories: Vec<String> = Vec::new();
    let mut files: Vec<FileEntry> = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        // Follows symlinks, so a link to a regular file lists as a file.
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(_) => continue,
        };

        if meta.is_dir() {
            directories.push(name);
        } else if meta.is_file() {
            files.push(FileEntry {
                name,
                size: meta.len(),
            });
        }
    }

    directories.sort_by(|a, b| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()));
    files.sort_by(|a, b| a.name.to_ascii_lowercase().cmp(&b.name.to_ascii_lowercase()));

    Ok(Listing {
        path: path.to_string(),
        directories,
        files,
    })
}
