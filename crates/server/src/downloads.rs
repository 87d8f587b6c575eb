//! Browsing the source directory for files to approve by hand.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use mediasort_core::Settings;
use mediasort_core::config::dotted_extension;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct DownloadEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size_bytes: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub is_video: bool,
}

#[derive(Debug, Serialize)]
pub struct DownloadListing {
    pub current_path: PathBuf,
    pub entries: Vec<DownloadEntry>,
}

/// Resolve `requested` (relative to the source directory, or absolute under
/// it) to a directory that may be listed. `..`, anything outside the source
/// directory and the incomplete directory are refused.
pub async fn resolve_folder(settings: &Settings, requested: Option<&str>) -> Result<PathBuf, ApiError> {
    let root = tokio::fs::canonicalize(&settings.source_dir)
        .await
        .map_err(|e| ApiError::NotFound(format!("source directory: {e}")))?;

    let requested = requested.map(str::trim).filter(|p| !p.is_empty());
    let Some(requested) = requested else {
        return Ok(root);
    };

    let rel = Path::new(requested);
    if rel.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(ApiError::BadRequest(format!("invalid path {requested}")));
    }
    let candidate = if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        root.join(rel)
    };
    let resolved = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| ApiError::NotFound(format!("folder {requested}")))?;

    if !resolved.starts_with(&root) {
        return Err(ApiError::BadRequest(format!(
            "{requested} is outside the source directory"
        )));
    }
    if is_incomplete(settings, &resolved).await {
        return Err(ApiError::BadRequest(format!("{requested} is still downloading")));
    }
    if !resolved.is_dir() {
        return Err(ApiError::BadRequest(format!("{requested} is not a folder")));
    }
    Ok(resolved)
}

/// Folders first, then files, each sorted by name. The incomplete
/// directory is left out.
pub async fn list_folder(settings: &Settings, folder: &Path) -> Result<DownloadListing, ApiError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    let mut entries = tokio::fs::read_dir(folder)
        .await
        .map_err(|e| ApiError::Internal(format!("reading {}: {e}", folder.display())))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ApiError::Internal(format!("reading {}: {e}", folder.display())))?
    {
        let path = entry.path();
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);
        let name = entry.file_name().to_string_lossy().into_owned();

        if meta.is_dir() {
            if is_incomplete(settings, &path).await {
                continue;
            }
            dirs.push(DownloadEntry {
                name,
                path,
                is_directory: true,
                size_bytes: None,
                modified,
                is_video: false,
            });
        } else {
            let is_video = settings.extensions.is_video(&dotted_extension(&path));
            files.push(DownloadEntry {
                name,
                path,
                is_directory: false,
                size_bytes: Some(meta.len()),
                modified,
                is_video,
            });
        }
    }

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.extend(files);
    Ok(DownloadListing {
        current_path: folder.to_path_buf(),
        entries: dirs,
    })
}

async fn is_incomplete(settings: &Settings, path: &Path) -> bool {
    if settings.is_incomplete(path) {
        return true;
    }
    match tokio::fs::canonicalize(&settings.incomplete_dir).await {
        Ok(incomplete) => path.starts_with(incomplete),
        Err(_) => false,
    }
}
