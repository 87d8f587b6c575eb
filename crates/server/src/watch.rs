//! Source directory watcher.
//!
//! Created and modified paths are held until no event has touched them for
//! the settle time, then each one is handed to the organizer on its own task.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediasort_organizer::{FileOutcome, OrganizeError, Organizer};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

type Pending = Arc<Mutex<HashMap<PathBuf, Instant>>>;

/// Remove and return every path quiet for at least `settle`.
pub fn take_settled(
    pending: &Mutex<HashMap<PathBuf, Instant>>,
    now: Instant,
    settle: Duration,
) -> Vec<PathBuf> {
    let mut settled = Vec::new();
    pending.lock().retain(|path, last_seen| {
        if now.duration_since(*last_seen) >= settle {
            settled.push(path.clone());
            false
        } else {
            true
        }
    });
    settled.sort();
    settled
}

pub async fn run_watcher(organizer: Arc<Organizer>, cancel: CancellationToken) {
    let settings = organizer.settings();
    if !settings.watch.enabled {
        info!("file watcher disabled");
        return;
    }
    let root = settings.source_dir.clone();
    let settle = Duration::from_secs(settings.watch.settle_secs);

    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let sink = pending.clone();
    let mut watcher: RecommendedWatcher =
        match notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        let mut map = sink.lock();
                        for path in event.paths {
                            map.insert(path, Instant::now());
                        }
                    }
                }
                Err(e) => warn!(error = %e, "watch error"),
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "failed to create file watcher");
                return;
            }
        };

    if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
        error!(path = %root.display(), error = %e, "failed to watch source directory");
        return;
    }
    info!(path = %root.display(), settle_secs = settle.as_secs(), "watching source directory");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        for path in take_settled(&pending, Instant::now(), settle) {
            if !path.is_file() {
                continue;
            }
            let organizer = organizer.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                match organizer.process_file(&path, &cancel).await {
                    Ok(FileOutcome::Processed(outcome)) => debug!(
                        path = %path.display(),
                        status = %outcome.status,
                        "watched file processed"
                    ),
                    Ok(_) => {}
                    Err(OrganizeError::Cancelled) => {}
                    Err(e) => error!(path = %path.display(), error = %e, "watched file failed"),
                }
            });
        }
    }

    info!("file watcher stopped");
    drop(watcher);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_quiet_paths_settle() {
        let pending = Mutex::new(HashMap::new());
        let t0 = Instant::now();
        pending.lock().insert(PathBuf::from("/dl/a.mkv"), t0);
        pending
            .lock()
            .insert(PathBuf::from("/dl/b.mkv"), t0 + Duration::from_secs(4));

        let settled = take_settled(&pending, t0 + Duration::from_secs(5), Duration::from_secs(5));
        assert_eq!(settled, vec![PathBuf::from("/dl/a.mkv")]);
        assert_eq!(pending.lock().len(), 1);

        let settled = take_settled(&pending, t0 + Duration::from_secs(9), Duration::from_secs(5));
        assert_eq!(settled, vec![PathBuf::from("/dl/b.mkv")]);
        assert!(pending.lock().is_empty());
    }
}
