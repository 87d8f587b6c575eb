pub mod downloads;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod watch;

use std::sync::Arc;

use mediasort_core::Settings;
use mediasort_metadata::{MetadataProvider, MetadataResolver, TmdbClient, TvdbClient};
use mediasort_organizer::Organizer;
use mediasort_organizer::notify::LogNotifier;
use sqlx::SqlitePool;

/// Provider chain from the configured API keys. Providers without a key stay
/// in the chain but report themselves unavailable.
pub fn build_resolver(settings: &Settings) -> MetadataResolver {
    let tmdb = TmdbClient::new(settings.tmdb_api_key.clone().unwrap_or_default());
    let tvdb = TvdbClient::new(settings.tvdb_api_key.clone().unwrap_or_default());
    MetadataResolver::new(vec![
        Arc::new(tmdb) as Arc<dyn MetadataProvider>,
        Arc::new(tvdb),
    ])
}

pub fn build_organizer(settings: Arc<Settings>, pool: SqlitePool) -> Organizer {
    let resolver = Arc::new(build_resolver(&settings));
    let notifier = Arc::new(LogNotifier::new(settings.notifications.clone()));
    Organizer::new(settings, pool, resolver).with_notifier(notifier)
}
