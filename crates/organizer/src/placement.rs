//! Destination layout and idempotent file placement.
//!
//! Bytes are streamed into a temporary sibling `.<name>.<uuid>.partial`
//! owned by one copy, and published only once complete, so an existing
//! destination is always a whole file. Concurrent copies to one destination
//! never share a temporary file; the first to publish wins.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 256 * 1024;
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("cancelled")]
    Cancelled,
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PlaceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Copied,
    AlreadyPresent,
}

/// `Title (Year)`, or just `Title` when the year is unknown. The title is
/// made safe for use as a path component.
pub fn base_name(title: &str, year: Option<i32>) -> String {
    let safe = sanitize_filename::sanitize(title);
    let safe = safe.trim();
    let safe = if safe.is_empty() { "Unknown" } else { safe };
    match year {
        Some(y) => format!("{safe} ({y})"),
        None => safe.to_string(),
    }
}

/// `{root}/{Title (Year)}/{Title (Year)}{ext}`
pub fn movie_destination(root: &Path, title: &str, year: Option<i32>, ext: &str) -> PathBuf {
    let base = base_name(title, year);
    root.join(&base).join(format!("{base}{ext}"))
}

/// `{root}/{Show (Year)}/Season {SS}/{Show (Year)} - s{SS}e{EE}{ext}`
pub fn episode_destination(
    root: &Path,
    show: &str,
    year: Option<i32>,
    season: u32,
    episode: u32,
    ext: &str,
) -> PathBuf {
    let base = base_name(show, year);
    root.join(&base)
        .join(format!("Season {season:02}"))
        .join(format!("{base} - s{season:02}e{episode:02}{ext}"))
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(
        ".{name}.{}{PARTIAL_SUFFIX}",
        uuid::Uuid::new_v4().simple()
    ))
}

/// Move a finished temporary file to `dest` without replacing anything
/// already there. Filesystems without hard links fall back to a checked
/// rename.
async fn publish(tmp: &Path, dest: &Path) -> Result<Placement, PlaceError> {
    let placement = match tokio::fs::hard_link(tmp, dest).await {
        Ok(()) => Placement::Copied,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Placement::AlreadyPresent,
        Err(_) => {
            if tokio::fs::try_exists(dest).await.unwrap_or(false) {
                Placement::AlreadyPresent
            } else {
                tokio::fs::rename(tmp, dest)
                    .await
                    .map_err(|e| PlaceError::io(dest, e))?;
                return Ok(Placement::Copied);
            }
        }
    };
    let _ = tokio::fs::remove_file(tmp).await;
    Ok(placement)
}

async fn ensure_parent(dest: &Path) -> Result<(), PlaceError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PlaceError::io(parent, e))?;
    }
    Ok(())
}

/// Copy `src` to `dest` unless `dest` already exists. A cancelled or failed
/// copy leaves nothing at `dest`.
pub async fn place_file(
    src: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<Placement, PlaceError> {
    if tokio::fs::try_exists(dest).await.unwrap_or(false) {
        return Ok(Placement::AlreadyPresent);
    }
    ensure_parent(dest).await?;

    let tmp = partial_path(dest);
    let result = copy_stream(src, &tmp, cancel).await;
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }

    let result = publish(&tmp, dest).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

async fn copy_stream(src: &Path, tmp: &Path, cancel: &CancellationToken) -> Result<(), PlaceError> {
    let mut reader = tokio::fs::File::open(src)
        .await
        .map_err(|e| PlaceError::io(src, e))?;
    let mut writer = tokio::fs::File::create(tmp)
        .await
        .map_err(|e| PlaceError::io(tmp, e))?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        if cancel.is_cancelled() {
            return Err(PlaceError::Cancelled);
        }
        let n = reader.read(&mut buf).await.map_err(|e| PlaceError::io(src, e))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buf[..n])
            .await
            .map_err(|e| PlaceError::io(tmp, e))?;
    }

    writer.flush().await.map_err(|e| PlaceError::io(tmp, e))?;
    writer.sync_all().await.map_err(|e| PlaceError::io(tmp, e))?;
    Ok(())
}

/// Write `bytes` to `dest` through a temporary file, replacing any existing
/// file.
pub async fn write_bytes(dest: &Path, bytes: &[u8]) -> Result<(), PlaceError> {
    ensure_parent(dest).await?;
    let tmp = partial_path(dest);
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PlaceError::io(&tmp, e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PlaceError::io(dest, e));
    }
    Ok(())
}
