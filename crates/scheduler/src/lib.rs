//! Named recurring jobs driven by cron expressions.
//!
//! Every job owns one task looping "compute next occurrence, sleep, run".
//! Jobs are keyed by name; scheduling an existing name replaces the old
//! loop. A failing action is logged and the loop carries on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use croner::Cron;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression {expr:?}: {reason}")]
    InvalidCron { expr: String, reason: String },
    #[error("job name must not be empty")]
    EmptyName,
}

/// Job body. Receives a token that fires when the job is cancelled or
/// replaced.
pub type JobAction =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`JobAction`].
pub fn action<F, Fut>(f: F) -> JobAction
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |cancel| Box::pin(f(cancel)))
}

/// Accepts 5-field and 6-field (leading seconds) expressions.
pub fn parse_cron(expr: &str) -> Result<Cron, SchedulerError> {
    Cron::new(expr.trim())
        .with_seconds_optional()
        .parse()
        .map_err(|e| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JobInfo {
    pub name: String,
    pub cron: String,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub running: bool,
}

#[derive(Debug, Default)]
struct JobStatus {
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    running: bool,
}

struct JobEntry {
    cron: String,
    status: Arc<Mutex<JobStatus>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct JobScheduler {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    root: CancellationToken,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            root: CancellationToken::new(),
        }
    }

    /// Start (or replace) the job called `name`. Must be called from within
    /// a Tokio runtime.
    pub fn schedule(
        &self,
        name: &str,
        cron_expr: &str,
        action: JobAction,
    ) -> Result<(), SchedulerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SchedulerError::EmptyName);
        }
        let cron = parse_cron(cron_expr)?;

        let status = Arc::new(Mutex::new(JobStatus {
            next_run: cron.find_next_occurrence(&Utc::now(), false).ok(),
            ..JobStatus::default()
        }));
        let cancel = self.root.child_token();
        let handle = tokio::spawn(run_loop(
            name.to_string(),
            cron,
            action,
            status.clone(),
            cancel.clone(),
        ));

        let entry = JobEntry {
            cron: cron_expr.trim().to_string(),
            status,
            cancel,
            handle,
        };
        let previous = self.jobs.lock().insert(name.to_string(), entry);
        if let Some(old) = previous {
            old.cancel.cancel();
            info!(job = name, cron = cron_expr, "job replaced");
        } else {
            info!(job = name, cron = cron_expr, "job scheduled");
        }
        Ok(())
    }

    /// Stop and forget a job. Returns false when no such job exists.
    pub fn cancel(&self, name: &str) -> bool {
        match self.jobs.lock().remove(name) {
            Some(entry) => {
                entry.cancel.cancel();
                info!(job = name, "job cancelled");
                true
            }
            None => false,
        }
    }

    /// Snapshot of every job, sorted by name.
    pub fn list(&self) -> Vec<JobInfo> {
        let jobs = self.jobs.lock();
        let mut out: Vec<JobInfo> = jobs
            .iter()
            .map(|(name, entry)| {
                let status = entry.status.lock();
                JobInfo {
                    name: name.clone(),
                    cron: entry.cron.clone(),
                    next_run: status.next_run,
                    last_run: status.last_run,
                    running: status.running,
                }
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn contains(&self, name: &str) -> bool {
        self.jobs.lock().contains_key(name)
    }

    /// Cancel every job and wait for the loops to finish.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let handles: Vec<(String, JoinHandle<()>)> = self
            .jobs
            .lock()
            .drain()
            .map(|(name, entry)| (name, entry.handle))
            .collect();
        for (name, handle) in handles {
            if let Err(e) = handle.await {
                error!(job = %name, error = %e, "job loop did not stop cleanly");
            }
        }
        info!("scheduler stopped");
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn run_loop(
    name: String,
    cron: Cron,
    action: JobAction,
    status: Arc<Mutex<JobStatus>>,
    cancel: CancellationToken,
) {
    // Never search from before the last fire time, so one occurrence
    // cannot fire twice.
    let mut after = Utc::now();
    loop {
        let now = Utc::now();
        if now > after {
            after = now;
        }

        let next = match cron.find_next_occurrence(&after, false) {
            Ok(next) => next,
            Err(e) => {
                info!(job = %name, error = %e, "no further occurrences, job is dormant");
                status.lock().next_run = None;
                return;
            }
        };
        status.lock().next_run = Some(next);

        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(job = %name, "job loop stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let started = Utc::now();
        status.lock().running = true;
        debug!(job = %name, "job started");

        let run = tokio::spawn((action)(cancel.child_token())).await;
        match run {
            Ok(Ok(())) => debug!(job = %name, "job finished"),
            Ok(Err(e)) if cancel.is_cancelled() => {
                debug!(job = %name, error = %e, "job interrupted by cancellation")
            }
            Ok(Err(e)) => error!(job = %name, error = %format!("{e:#}"), "job failed"),
            Err(e) => error!(job = %name, error = %e, "job panicked"),
        }

        {
            let mut s = status.lock();
            s.running = false;
            s.last_run = Some(started);
        }
        after = next;
    }
}
