use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::OrganizeError;

/// Directories never worth descending into.
const JUNK_DIRS: &[&str] = &["@eaDir", "#recycle", ".Trash", "$RECYCLE.BIN"];

/// Depth-first listing of every regular file under `root`, in name order.
/// The token is checked before each entry and each descent. Blocking; run it
/// on the blocking pool.
pub fn collect_files(root: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>, OrganizeError> {
    let mut files = Vec::new();
    walk_recursive(root, cancel, &mut files)?;
    Ok(files)
}

fn walk_recursive(
    dir: &Path,
    cancel: &CancellationToken,
    files: &mut Vec<PathBuf>,
) -> Result<(), OrganizeError> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot read directory");
            return Ok(());
        }
    };

    let mut entries: Vec<_> = read_dir.flatten().collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(OrganizeError::Cancelled);
        }

        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            let name = entry.file_name();
            if name.to_str().is_some_and(|n| JUNK_DIRS.contains(&n)) {
                debug!(path = %path.display(), "skipping junk directory");
                continue;
            }
            walk_recursive(&path, cancel, files)?;
        } else if file_type.is_file() {
            files.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lists_nested_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::create_dir_all(dir.path().join("@eaDir")).unwrap();
        fs::write(dir.path().join("a.mkv"), "x").unwrap();
        fs::write(dir.path().join("b/inner/c.mkv"), "x").unwrap();
        fs::write(dir.path().join("@eaDir/thumb.jpg"), "x").unwrap();

        let files = collect_files(dir.path(), &CancellationToken::new()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.mkv", "b/inner/c.mkv"]);
    }

    #[test]
    fn missing_root_is_empty() {
        let files = collect_files(Path::new("/no/such/dir"), &CancellationToken::new()).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn cancellation_aborts_walk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mkv"), "x").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            collect_files(dir.path(), &cancel),
            Err(OrganizeError::Cancelled)
        ));
    }
}
