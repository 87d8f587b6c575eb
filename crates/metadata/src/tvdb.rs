//! TheTVDB v4 provider client.
//!
//! Every data call carries a bearer token obtained from `POST /login`. Tokens
//! live 24 hours; the cached one is dropped an hour early, and a 401 on any
//! data call invalidates it so the next call logs in again.

use std::time::Duration;

use mediasort_core::ItemKind;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::provider::{Candidate, MetadataProvider};
use crate::{MediaMetadata, MetadataError, fetch_bytes, year_prefix};

pub const DEFAULT_BASE_URL: &str = "https://api4.thetvdb.com/v4";
pub const DEFAULT_ARTWORK_BASE: &str = "https://artworks.thetvdb.com";

const TOKEN_LIFETIME: Duration = Duration::from_secs(23 * 60 * 60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TvdbClient {
    api_key: String,
    base_url: String,
    artwork_base: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl TvdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, DEFAULT_ARTWORK_BASE)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        artwork_base: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            artwork_base: artwork_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Current bearer token, logging in when none is cached or it has expired.
    async fn token(&self) -> Result<String, MetadataError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let resp = self
            .client
            .post(format!("{}/login", self.base_url))
            .json(&serde_json::json!({ "apikey": self.api_key }))
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            *guard = None;
            return Err(MetadataError::Auth(format!(
                "TVDB login returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| MetadataError::Auth(format!("parse login response: {e}")))?;
        let value = body["data"]["token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MetadataError::Auth("login response carried no token".into()))?
            .to_string();

        info!("authenticated with TVDB");
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + TOKEN_LIFETIME,
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, MetadataError> {
        let token = self.token().await?;
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TVDB request");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::UNAUTHORIZED => {
                warn!("TVDB rejected the cached token");
                self.invalidate_token().await;
                return Err(MetadataError::Auth("TVDB token rejected".into()));
            }
            reqwest::StatusCode::NOT_FOUND => return Err(MetadataError::NotFound),
            s if !s.is_success() => {
                return Err(MetadataError::Provider(format!("TVDB returned {s}")));
            }
            _ => {}
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON: {e}")))
    }

    async fn search(
        &self,
        title: &str,
        year: Option<i32>,
        kind: ItemKind,
    ) -> Result<Option<Candidate>, MetadataError> {
        let search_type = match kind {
            ItemKind::Movie => "movie",
            _ => "series",
        };
        let mut params = vec![("query", title), ("type", search_type)];
        let year_str = year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push(("year", y));
        }

        let data = match self.get_json("/search", &params).await {
            Ok(data) => data,
            Err(MetadataError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(data["data"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|r| parse_candidate(r, kind)))
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TvdbClient {
    fn name(&self) -> &str {
        "tvdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>, MetadataError> {
        self.search(title, year, ItemKind::Movie).await
    }

    async fn search_series(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>, MetadataError> {
        self.search(title, year, ItemKind::Series).await
    }

    async fn fetch_details(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<MediaMetadata>, MetadataError> {
        let id = &candidate.provider_id;
        let path = match candidate.kind {
            ItemKind::Movie => format!("/movies/{id}/extended"),
            _ => format!("/series/{id}/extended"),
        };

        let data = match self.get_json(&path, &[]).await {
            Ok(data) => data,
            Err(MetadataError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(match candidate.kind {
            ItemKind::Movie => parse_movie_metadata(&data["data"], &self.artwork_base),
            _ => parse_series_metadata(&data["data"], &self.artwork_base),
        })
    }

    async fn download_image(&self, url: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        fetch_bytes(&self.client, url).await
    }
}

/// Search hits carry the numeric id in `tvdb_id`; older payloads use `id`,
/// sometimes prefixed with the record type (`series-81189`).
fn parse_candidate(r: &serde_json::Value, kind: ItemKind) -> Option<Candidate> {
    let raw_id = json_string(&r["tvdb_id"]).or_else(|| json_string(&r["id"]))?;
    let provider_id = raw_id
        .rsplit('-')
        .next()
        .unwrap_or(raw_id.as_str())
        .to_string();
    if provider_id.is_empty() {
        return None;
    }

    Some(Candidate {
        provider_id,
        title: r["name"].as_str().unwrap_or_default().to_string(),
        year: json_string(&r["year"]).and_then(|y| y.parse().ok()),
        kind,
    })
}

fn json_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn artwork_url(base: &str, image: &serde_json::Value) -> Option<String> {
    let image = image.as_str().filter(|s| !s.is_empty())?;
    if image.starts_with("http://") || image.starts_with("https://") {
        Some(image.to_string())
    } else {
        Some(format!("{base}{image}"))
    }
}

/// Artwork type 3 is a series background and 15 a movie background.
fn is_background(art: &serde_json::Value) -> bool {
    match &art["type"] {
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("background"),
        serde_json::Value::Number(n) => matches!(n.as_i64(), Some(3) | Some(15)),
        _ => false,
    }
}

fn backdrop(data: &serde_json::Value, base: &str) -> Option<String> {
    data["artworks"]
        .as_array()?
        .iter()
        .find(|a| is_background(a))
        .and_then(|a| artwork_url(base, &a["image"]))
}

fn genre_names(data: &serde_json::Value) -> Vec<String> {
    data["genres"]
        .as_array()
        .map(|gs| {
            gs.iter()
                .filter_map(|g| g["name"].as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn imdb_id(data: &serde_json::Value) -> Option<String> {
    data["remoteIds"]
        .as_array()?
        .iter()
        .find(|r| {
            r["sourceName"]
                .as_str()
                .is_some_and(|s| s.eq_ignore_ascii_case("IMDB"))
        })
        .and_then(|r| r["id"].as_str())
        .map(|s| s.to_string())
}

fn parse_movie_metadata(data: &serde_json::Value, artwork_base: &str) -> Option<MediaMetadata> {
    let title = data["name"].as_str().filter(|t| !t.is_empty())?;
    let mut meta = MediaMetadata::new("tvdb", ItemKind::Movie, title);
    meta.year = json_string(&data["year"]).and_then(|y| y.parse().ok());
    meta.overview = data["overview"].as_str().map(|s| s.to_string());
    meta.poster_url = artwork_url(artwork_base, &data["image"]);
    meta.backdrop_url = backdrop(data, artwork_base);
    meta.imdb_id = imdb_id(data);
    meta.external_id = json_string(&data["id"]);
    meta.genres = genre_names(data);
    Some(meta)
}

fn parse_series_metadata(data: &serde_json::Value, artwork_base: &str) -> Option<MediaMetadata> {
    let title = data["name"].as_str().filter(|t| !t.is_empty())?;
    let mut meta = MediaMetadata::new("tvdb", ItemKind::Series, title);
    meta.year = data["firstAired"]
        .as_str()
        .and_then(year_prefix)
        .or_else(|| json_string(&data["year"]).and_then(|y| y.parse().ok()));
    meta.overview = data["overview"].as_str().map(|s| s.to_string());
    meta.poster_url = artwork_url(artwork_base, &data["image"]);
    meta.backdrop_url = backdrop(data, artwork_base);
    meta.imdb_id = imdb_id(data);
    meta.external_id = json_string(&data["id"]);
    meta.genres = genre_names(data);
    meta.season_count = data["seasons"].as_array().map(|seasons| {
        seasons
            .iter()
            .filter(|s| {
                let ty = &s["type"];
                ty["type"]
                    .as_str()
                    .or_else(|| ty.as_str())
                    .is_some_and(|t| t.eq_ignore_ascii_case("official"))
            })
            .count() as i32
    });
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_id_strips_record_prefix() {
        let hit = serde_json::json!({ "id": "series-81189", "name": "Breaking Bad", "year": "2008" });
        let c = parse_candidate(&hit, ItemKind::Series).unwrap();
        assert_eq!(c.provider_id, "81189");
        assert_eq!(c.year, Some(2008));

        let hit = serde_json::json!({ "tvdb_id": "12345", "id": "movie-12345", "name": "X" });
        assert_eq!(
            parse_candidate(&hit, ItemKind::Movie).unwrap().provider_id,
            "12345"
        );

        let hit = serde_json::json!({ "id": 77, "name": "Y" });
        assert_eq!(
            parse_candidate(&hit, ItemKind::Movie).unwrap().provider_id,
            "77"
        );
    }

    #[test]
    fn series_counts_only_official_seasons() {
        let data = serde_json::json!({
            "id": 81189,
            "name": "Breaking Bad",
            "firstAired": "2008-01-20",
            "image": "/banners/posters/81189-1.jpg",
            "artworks": [
                { "type": 2, "image": "https://artworks.thetvdb.com/poster.jpg" },
                { "type": 3, "image": "https://artworks.thetvdb.com/fanart.jpg" }
            ],
            "remoteIds": [
                { "id": "tt0903747", "sourceName": "IMDB" }
            ],
            "seasons": [
                { "number": 0, "type": { "type": "official" } },
                { "number": 1, "type": { "type": "official" } },
                { "number": 1, "type": { "type": "dvd" } },
                { "number": 2, "type": "official" }
            ]
        });

        let meta = parse_series_metadata(&data, DEFAULT_ARTWORK_BASE).unwrap();
        assert_eq!(meta.year, Some(2008));
        assert_eq!(meta.season_count, Some(3));
        assert_eq!(meta.imdb_id.as_deref(), Some("tt0903747"));
        assert_eq!(meta.external_id.as_deref(), Some("81189"));
        assert_eq!(
            meta.poster_url.as_deref(),
            Some("https://artworks.thetvdb.com/banners/posters/81189-1.jpg")
        );
        assert_eq!(
            meta.backdrop_url.as_deref(),
            Some("https://artworks.thetvdb.com/fanart.jpg")
        );
    }

    #[test]
    fn movie_background_by_name() {
        let data = serde_json::json!({
            "id": 1,
            "name": "Inception",
            "year": "2010",
            "artworks": [{ "type": "background", "image": "/bg.jpg" }]
        });
        let meta = parse_movie_metadata(&data, "https://art").unwrap();
        assert_eq!(meta.year, Some(2010));
        assert_eq!(meta.backdrop_url.as_deref(), Some("https://art/bg.jpg"));
        assert!(meta.imdb_id.is_none());
    }
}
