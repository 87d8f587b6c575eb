//! TMDB (The Movie Database) provider client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use mediasort_core::ItemKind;
use tracing::debug;

use crate::provider::{Candidate, MetadataProvider};
use crate::{MediaMetadata, MetadataError, fetch_bytes, year_prefix};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

pub struct TmdbClient {
    api_key: String,
    base_url: String,
    image_base: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL, DEFAULT_IMAGE_BASE)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        image_base: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            image_base: image_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, MetadataError> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| MetadataError::Network(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => return Err(MetadataError::NotFound),
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(MetadataError::Auth("TMDB rejected the API key".into()));
            }
            s if !s.is_success() => {
                return Err(MetadataError::Provider(format!("TMDB returned {s}")));
            }
            _ => {}
        }

        resp.json()
            .await
            .map_err(|e| MetadataError::Provider(format!("parse JSON: {e}")))
    }

    async fn first_result(
        &self,
        path: &str,
        title: &str,
        year_param: &str,
        year: Option<i32>,
        kind: ItemKind,
    ) -> Result<Option<Candidate>, MetadataError> {
        let mut params = vec![("query", title)];
        let year_str = year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            params.push((year_param, y));
        }

        let data = self.get_json(path, &params).await?;
        Ok(data["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|r| parse_candidate(r, kind)))
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>, MetadataError> {
        self.first_result("/search/movie", title, "year", year, ItemKind::Movie)
            .await
    }

    async fn search_series(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>, MetadataError> {
        self.first_result(
            "/search/tv",
            title,
            "first_air_date_year",
            year,
            ItemKind::Series,
        )
        .await
    }

    async fn fetch_details(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<MediaMetadata>, MetadataError> {
        let id = &candidate.provider_id;
        let result = match candidate.kind {
            ItemKind::Movie => self
                .get_json(&format!("/movie/{id}"), &[])
                .await
                .map(|d| parse_movie_metadata(&d, &self.image_base)),
            _ => self
                .get_json(
                    &format!("/tv/{id}"),
                    &[("append_to_response", "external_ids")],
                )
                .await
                .map(|d| parse_series_metadata(&d, &self.image_base)),
        };

        match result {
            Ok(meta) => Ok(meta),
            Err(MetadataError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn download_image(&self, url: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        fetch_bytes(&self.client, url).await
    }
}

fn parse_candidate(r: &serde_json::Value, kind: ItemKind) -> Option<Candidate> {
    let (title_key, date_key) = match kind {
        ItemKind::Movie => ("title", "release_date"),
        _ => ("name", "first_air_date"),
    };
    Some(Candidate {
        provider_id: r["id"].as_u64()?.to_string(),
        title: r[title_key].as_str().unwrap_or_default().to_string(),
        year: r[date_key].as_str().and_then(year_prefix),
        kind,
    })
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

fn image_url(image_base: &str, path: &serde_json::Value) -> Option<String> {
    path.as_str()
        .filter(|p| !p.is_empty())
        .map(|p| format!("{image_base}{p}"))
}

/// A details payload without a title is treated as no match.
fn parse_movie_metadata(data: &serde_json::Value, image_base: &str) -> Option<MediaMetadata> {
    let title = data["title"].as_str().filter(|t| !t.is_empty())?;
    let mut meta = MediaMetadata::new("tmdb", ItemKind::Movie, title);
    meta.year = data["release_date"].as_str().and_then(year_prefix);
    meta.overview = data["overview"].as_str().map(|s| s.to_string());
    meta.poster_url = image_url(image_base, &data["poster_path"]);
    meta.backdrop_url = image_url(image_base, &data["backdrop_path"]);
    meta.imdb_id = data["imdb_id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    meta.external_id = data["id"].as_u64().map(|id| id.to_string());
    meta.genres = genre_names(data);
    Some(meta)
}

fn parse_series_metadata(data: &serde_json::Value, image_base: &str) -> Option<MediaMetadata> {
    let title = data["name"].as_str().filter(|t| !t.is_empty())?;
    let mut meta = MediaMetadata::new("tmdb", ItemKind::Series, title);
    meta.year = data["first_air_date"].as_str().and_then(year_prefix);
    meta.overview = data["overview"].as_str().map(|s| s.to_string());
    meta.poster_url = image_url(image_base, &data["poster_path"]);
    meta.backdrop_url = image_url(image_base, &data["backdrop_path"]);
    meta.imdb_id = data["external_ids"]["imdb_id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    meta.external_id = data["id"].as_u64().map(|id| id.to_string());
    meta.genres = genre_names(data);
    meta.season_count = data["number_of_seasons"].as_i64().map(|n| n as i32);
    meta.episode_count = data["number_of_episodes"].as_i64().map(|n| n as i32);
    Some(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_movie_metadata_from_json() {
        let json = serde_json::json!({
            "id": 27205,
            "title": "Inception",
            "overview": "A thief who steals corporate secrets...",
            "release_date": "2010-07-16",
            "imdb_id": "tt1375666",
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg",
            "genres": [
                { "id": 28, "name": "Action" },
                { "id": 878, "name": "Science Fiction" }
            ]
        });

        let meta = parse_movie_metadata(&json, DEFAULT_IMAGE_BASE).unwrap();
        assert_eq!(meta.title, "Inception");
        assert_eq!(meta.year, Some(2010));
        assert_eq!(meta.kind, ItemKind::Movie);
        assert_eq!(meta.imdb_id.as_deref(), Some("tt1375666"));
        assert_eq!(meta.external_id.as_deref(), Some("27205"));
        assert_eq!(meta.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(
            meta.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/original/poster.jpg")
        );
    }

    #[test]
    fn parse_series_metadata_from_json() {
        let json = serde_json::json!({
            "id": 1396,
            "name": "Breaking Bad",
            "first_air_date": "2008-01-20",
            "number_of_seasons": 5,
            "number_of_episodes": 62,
            "poster_path": null,
            "external_ids": { "imdb_id": "tt0903747" },
            "genres": [{ "name": "Drama" }]
        });

        let meta = parse_series_metadata(&json, DEFAULT_IMAGE_BASE).unwrap();
        assert_eq!(meta.title, "Breaking Bad");
        assert_eq!(meta.kind, ItemKind::Series);
        assert_eq!(meta.year, Some(2008));
        assert_eq!(meta.season_count, Some(5));
        assert_eq!(meta.episode_count, Some(62));
        assert_eq!(meta.imdb_id.as_deref(), Some("tt0903747"));
        assert!(meta.poster_url.is_none());
    }

    #[test]
    fn untitled_details_are_rejected() {
        let json = serde_json::json!({ "id": 1, "title": "" });
        assert!(parse_movie_metadata(&json, DEFAULT_IMAGE_BASE).is_none());
    }

    #[test]
    fn candidate_without_id_is_skipped() {
        let json = serde_json::json!({ "title": "Nope" });
        assert!(parse_candidate(&json, ItemKind::Movie).is_none());
    }

    #[test]
    fn blank_key_is_unavailable() {
        assert!(!TmdbClient::new("  ").is_available());
        assert!(TmdbClient::new("k").is_available());
    }
}
