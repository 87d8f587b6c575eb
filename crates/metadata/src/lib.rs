pub mod provider;
pub mod resolver;
pub mod tmdb;
pub mod tvdb;

pub use provider::{Candidate, MetadataProvider};
pub use resolver::{MetadataResolver, QueryKind};
pub use tmdb::TmdbClient;
pub use tvdb::TvdbClient;

use mediasort_core::ItemKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not found")]
    NotFound,
    #[error("cancelled")]
    Cancelled,
}

/// A complete catalog answer from one provider. Results are never merged
/// across providers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub imdb_id: Option<String>,
    /// Identifier within `provider`'s catalog.
    pub external_id: Option<String>,
    pub provider: String,
    pub kind: ItemKind,
    pub genres: Vec<String>,
    pub season_count: Option<i32>,
    pub episode_count: Option<i32>,
}

impl MediaMetadata {
    pub fn new(provider: &str, kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            overview: None,
            poster_url: None,
            backdrop_url: None,
            imdb_id: None,
            external_id: None,
            provider: provider.to_string(),
            kind,
            genres: Vec::new(),
            season_count: None,
            episode_count: None,
        }
    }
}

/// Leading four-digit year of a `YYYY-MM-DD` style date.
pub(crate) fn year_prefix(date: &str) -> Option<i32> {
    date.get(..4).and_then(|y| y.parse().ok())
}

/// Fetch raw bytes from an absolute URL. Shared by both providers.
pub(crate) async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<Vec<u8>>, MetadataError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| MetadataError::Network(e.to_string()))?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !resp.status().is_success() {
        return Err(MetadataError::Provider(format!(
            "image download returned {}",
            resp.status()
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| MetadataError::Network(e.to_string()))?;
    Ok(Some(bytes.to_vec()))
}
