//! Recurring job bodies and the jobs installed at startup.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mediasort_organizer::{OrganizeError, Organizer};
use mediasort_scheduler::{JobAction, JobScheduler, SchedulerError, action};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const SCAN_JOB: &str = "scan-source";
pub const SWEEP_JOB: &str = "duplicate-sweep";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ProcessDirectory,
    DuplicateSweep,
}

pub fn scan_action(organizer: Arc<Organizer>, dir: PathBuf) -> JobAction {
    action(move |cancel| {
        let organizer = organizer.clone();
        let dir = dir.clone();
        async move {
            match organizer.process_directory(&dir, &cancel).await {
                Ok(_) | Err(OrganizeError::Cancelled) => Ok(()),
                Err(e) => Err(e).with_context(|| format!("scan of {} failed", dir.display())),
            }
        }
    })
}

pub fn sweep_action(organizer: Arc<Organizer>, roots: Vec<PathBuf>) -> JobAction {
    action(move |cancel| {
        let organizer = organizer.clone();
        let roots = roots.clone();
        async move {
            for root in &roots {
                match organizer.scan_for_duplicates(root, &cancel).await {
                    Ok(_) => {}
                    Err(OrganizeError::Cancelled) => return Ok(()),
                    Err(e) => {
                        return Err(e).with_context(|| {
                            format!("duplicate sweep of {} failed", root.display())
                        });
                    }
                }
            }
            Ok(())
        }
    })
}

/// Library roots swept for duplicates when no directory is given.
pub fn library_roots(organizer: &Organizer) -> Vec<PathBuf> {
    let settings = organizer.settings();
    vec![settings.movies_dir.clone(), settings.tv_dir.clone()]
}

/// Build the action for a job created through the control API.
pub fn action_for(organizer: &Arc<Organizer>, kind: JobKind, directory: Option<PathBuf>) -> JobAction {
    match kind {
        JobKind::ProcessDirectory => {
            let dir = directory.unwrap_or_else(|| organizer.settings().source_dir.clone());
            scan_action(organizer.clone(), dir)
        }
        JobKind::DuplicateSweep => {
            let roots = match directory {
                Some(dir) => vec![dir],
                None => library_roots(organizer),
            };
            sweep_action(organizer.clone(), roots)
        }
    }
}

/// `scan-source` and `duplicate-sweep` from the scheduler settings.
pub fn install_default_jobs(
    scheduler: &JobScheduler,
    organizer: &Arc<Organizer>,
) -> Result<(), SchedulerError> {
    let settings = organizer.settings();
    scheduler.schedule(
        SCAN_JOB,
        &settings.scheduler.scan_cron,
        action_for(organizer, JobKind::ProcessDirectory, None),
    )?;
    scheduler.schedule(
        SWEEP_JOB,
        &settings.scheduler.duplicate_sweep_cron,
        action_for(organizer, JobKind::DuplicateSweep, None),
    )?;
    Ok(())
}

/// One-off scan of the source directory, logged rather than returned.
pub async fn run_scan(organizer: Arc<Organizer>, cancel: CancellationToken) {
    let dir = organizer.settings().source_dir.clone();
    match organizer.process_directory(&dir, &cancel).await {
        Ok(summary) => info!(
            dir = %dir.display(),
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            "scan finished"
        ),
        Err(OrganizeError::Cancelled) => info!(dir = %dir.display(), "scan cancelled"),
        Err(e) => error!(dir = %dir.display(), error = %e, "scan failed"),
    }
}
