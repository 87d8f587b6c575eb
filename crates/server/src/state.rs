use std::sync::Arc;

use mediasort_core::Settings;
use mediasort_organizer::Organizer;
use mediasort_scheduler::JobScheduler;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub organizer: Arc<Organizer>,
    pub scheduler: Arc<JobScheduler>,
    /// Root token; cancelled on Ctrl-C.
    pub shutdown: CancellationToken,
}
