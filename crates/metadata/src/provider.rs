use mediasort_core::ItemKind;

use crate::{MediaMetadata, MetadataError};

/// A remote catalog that can answer both movie and series queries.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Providers without credentials report themselves unavailable and are
    /// skipped by the resolver.
    fn is_available(&self) -> bool {
        true
    }

    /// First search hit for a movie title, if any.
    async fn search_movie(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>, MetadataError>;

    /// First search hit for a series title, if any.
    async fn search_series(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Option<Candidate>, MetadataError>;

    async fn fetch_details(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<MediaMetadata>, MetadataError>;

    async fn download_image(&self, url: &str) -> Result<Option<Vec<u8>>, MetadataError>;
}

/// A search hit, identified within its provider's catalog.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
    pub provider_id: String,
    pub title: String,
    pub year: Option<i32>,
    pub kind: ItemKind,
}
