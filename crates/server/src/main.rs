use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mediasort_core::Settings;
use mediasort_scheduler::JobScheduler;
use mediasort_server::state::AppState;
use mediasort_server::{jobs, routes, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("MEDIASORT_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path: PathBuf = std::env::var("MEDIASORT_CONFIG")
        .unwrap_or_else(|_| "mediasort.toml".to_string())
        .into();
    let mut settings = Settings::load(&config_path).context("failed to load configuration")?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    let settings = Arc::new(settings);
    info!(config = %config_path.display(), "configuration loaded");

    info!(db_path = %settings.database.path, "connecting to database");
    let pool = mediasort_db::open(&settings.database.path)
        .await
        .context("failed to open database")?;
    info!("migrations complete");

    for dir in [
        &settings.source_dir,
        &settings.incomplete_dir,
        &settings.movies_dir,
        &settings.tv_dir,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let organizer = Arc::new(mediasort_server::build_organizer(settings.clone(), pool.clone()));
    let scheduler = Arc::new(JobScheduler::new());
    let shutdown = CancellationToken::new();

    if settings.scheduler.enabled {
        jobs::install_default_jobs(&scheduler, &organizer)
            .context("failed to schedule recurring jobs")?;
    }

    tokio::spawn(jobs::run_scan(organizer.clone(), shutdown.child_token()));
    tokio::spawn(watch::run_watcher(organizer.clone(), shutdown.child_token()));

    let state = AppState {
        db: pool,
        settings: settings.clone(),
        organizer,
        scheduler: scheduler.clone(),
        shutdown: shutdown.clone(),
    };
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .context("failed to bind")?;
    info!(addr = %settings.server.bind, "server listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    scheduler.shutdown().await;
    Ok(())
}
