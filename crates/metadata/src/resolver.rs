//! Provider chain with a per-kind ordering table.
//!
//! Each query walks its chain in order: search, then fetch details for the
//! first hit. The first complete answer wins. Provider failures of any kind
//! only move the walk to the next provider.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::MetadataProvider;
use crate::{MediaMetadata, MetadataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Movie,
    Series,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

/// Provider names in query order, per kind.
pub const DEFAULT_ORDER: &[(QueryKind, &[&str])] = &[
    (QueryKind::Movie, &["tmdb", "tvdb"]),
    (QueryKind::Series, &["tvdb", "tmdb"]),
];

pub struct MetadataResolver {
    movie_chain: Vec<Arc<dyn MetadataProvider>>,
    series_chain: Vec<Arc<dyn MetadataProvider>>,
}

impl MetadataResolver {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        Self::with_order(providers, DEFAULT_ORDER)
    }

    /// Build both chains from `order`. Providers the table does not name are
    /// appended in the order given.
    pub fn with_order(
        providers: Vec<Arc<dyn MetadataProvider>>,
        order: &[(QueryKind, &[&str])],
    ) -> Self {
        let chain_for = |kind: QueryKind| {
            let names: &[&str] = order
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, names)| *names)
                .unwrap_or(&[]);

            let mut chain: Vec<Arc<dyn MetadataProvider>> = names
                .iter()
                .filter_map(|n| providers.iter().find(|p| p.name() == *n).cloned())
                .collect();
            for p in &providers {
                if !names.contains(&p.name()) {
                    chain.push(p.clone());
                }
            }
            chain
        };

        Self {
            movie_chain: chain_for(QueryKind::Movie),
            series_chain: chain_for(QueryKind::Series),
        }
    }

    pub fn chain(&self, kind: QueryKind) -> &[Arc<dyn MetadataProvider>] {
        match kind {
            QueryKind::Movie => &self.movie_chain,
            QueryKind::Series => &self.series_chain,
        }
    }

    /// Names of the providers that would be consulted for `kind`.
    pub fn provider_names(&self, kind: QueryKind) -> Vec<String> {
        self.chain(kind)
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name().to_string())
            .collect()
    }

    pub async fn resolve_movie(
        &self,
        title: &str,
        year: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaMetadata>, MetadataError> {
        self.resolve(QueryKind::Movie, title, year, cancel).await
    }

    pub async fn resolve_tv(
        &self,
        title: &str,
        year: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaMetadata>, MetadataError> {
        self.resolve(QueryKind::Series, title, year, cancel).await
    }

    /// `Ok(None)` means no provider produced a match. The only error is
    /// cancellation.
    pub async fn resolve(
        &self,
        kind: QueryKind,
        title: &str,
        year: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaMetadata>, MetadataError> {
        for provider in self.chain(kind) {
            if !provider.is_available() {
                debug!(provider = provider.name(), "provider unavailable, skipping");
                continue;
            }

            match cancellable(cancel, query_one(provider.as_ref(), kind, title, year)).await? {
                Ok(Some(meta)) => {
                    debug!(provider = provider.name(), title, kind = kind.as_str(), "metadata resolved");
                    return Ok(Some(meta));
                }
                Ok(None) => {
                    debug!(provider = provider.name(), title, kind = kind.as_str(), "no match");
                }
                Err(e) => {
                    warn!(provider = provider.name(), title, error = %e, "provider failed, trying next");
                }
            }
        }
        Ok(None)
    }

    /// Download artwork through the first provider that returns bytes.
    pub async fn download_image(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>, MetadataError> {
        for provider in self.chain(QueryKind::Movie) {
            if !provider.is_available() {
                continue;
            }
            match cancellable(cancel, provider.download_image(url)).await? {
                Ok(Some(bytes)) => return Ok(Some(bytes)),
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = provider.name(), url, error = %e, "image download failed");
                }
            }
        }
        Ok(None)
    }
}

async fn query_one(
    provider: &dyn MetadataProvider,
    kind: QueryKind,
    title: &str,
    year: Option<i32>,
) -> Result<Option<MediaMetadata>, MetadataError> {
    let candidate = match kind {
        QueryKind::Movie => provider.search_movie(title, year).await?,
        QueryKind::Series => provider.search_series(title, year).await?,
    };
    match candidate {
        Some(c) => provider.fetch_details(&c).await,
        None => Ok(None),
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, MetadataError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MetadataError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Candidate;
    use mediasort_core::ItemKind;
    use std::sync::Mutex;

    /// Scripted provider that records every call it receives.
    struct FakeProvider {
        name: &'static str,
        available: bool,
        answer: Option<&'static str>,
        fail_with_auth: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new(name: &'static str, answer: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: true,
                answer,
                fail_with_auth: false,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn search(&self, op: &str, title: &str, kind: ItemKind) -> Result<Option<Candidate>, MetadataError> {
            self.calls.lock().unwrap().push(format!("{op}:{title}"));
            if self.fail_with_auth {
                return Err(MetadataError::Auth("denied".into()));
            }
            Ok(self.answer.map(|_| Candidate {
                provider_id: "1".into(),
                title: title.into(),
                year: None,
                kind,
            }))
        }
    }

    #[async_trait::async_trait]
    impl MetadataProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn search_movie(&self, title: &str, _year: Option<i32>) -> Result<Option<Candidate>, MetadataError> {
            self.search("movie", title, ItemKind::Movie)
        }

        async fn search_series(&self, title: &str, _year: Option<i32>) -> Result<Option<Candidate>, MetadataError> {
            self.search("series", title, ItemKind::Series)
        }

        async fn fetch_details(&self, c: &Candidate) -> Result<Option<MediaMetadata>, MetadataError> {
            self.calls.lock().unwrap().push(format!("details:{}", c.provider_id));
            Ok(self.answer.map(|t| MediaMetadata::new(self.name, c.kind, t)))
        }

        async fn download_image(&self, _url: &str) -> Result<Option<Vec<u8>>, MetadataError> {
            self.calls.lock().unwrap().push("image".into());
            Ok(self.answer.map(|t| t.as_bytes().to_vec()))
        }
    }

    fn resolver(a: &Arc<FakeProvider>, b: &Arc<FakeProvider>) -> MetadataResolver {
        MetadataResolver::new(vec![a.clone() as Arc<dyn MetadataProvider>, b.clone()])
    }

    #[tokio::test]
    async fn movie_queries_tmdb_first() {
        let tmdb = FakeProvider::new("tmdb", Some("From TMDB"));
        let tvdb = FakeProvider::new("tvdb", Some("From TVDB"));
        let r = resolver(&tmdb, &tvdb);

        let meta = r
            .resolve_movie("Example", Some(2021), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.provider, "tmdb");
        assert!(tvdb.calls().is_empty());
    }

    #[tokio::test]
    async fn series_queries_tvdb_first() {
        let tmdb = FakeProvider::new("tmdb", Some("From TMDB"));
        let tvdb = FakeProvider::new("tvdb", Some("From TVDB"));
        let r = resolver(&tmdb, &tvdb);

        let meta = r
            .resolve_tv("Demo", None, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.provider, "tvdb");
        assert_eq!(meta.kind, ItemKind::Series);
        assert!(tmdb.calls().is_empty());
    }

    #[tokio::test]
    async fn auth_failure_falls_through_to_next_provider() {
        let tvdb = Arc::new(FakeProvider {
            name: "tvdb",
            available: true,
            answer: Some("never"),
            fail_with_auth: true,
            calls: Mutex::new(Vec::new()),
        });
        let tmdb = FakeProvider::new("tmdb", Some("From TMDB"));
        let r = resolver(&tmdb, &tvdb);

        let meta = r
            .resolve_tv("Demo", None, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.provider, "tmdb");
        assert_eq!(tvdb.calls(), vec!["series:Demo"]);
    }

    #[tokio::test]
    async fn no_match_anywhere_is_none() {
        let tmdb = FakeProvider::new("tmdb", None);
        let tvdb = FakeProvider::new("tvdb", None);
        let r = resolver(&tmdb, &tvdb);

        let out = r
            .resolve_movie("Nothing", None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.is_none());
        assert_eq!(tmdb.calls(), vec!["movie:Nothing"]);
        assert_eq!(tvdb.calls(), vec!["movie:Nothing"]);
    }

    #[tokio::test]
    async fn unavailable_provider_is_never_called() {
        let tmdb = Arc::new(FakeProvider {
            name: "tmdb",
            available: false,
            answer: Some("x"),
            fail_with_auth: false,
            calls: Mutex::new(Vec::new()),
        });
        let tvdb = FakeProvider::new("tvdb", Some("From TVDB"));
        let r = resolver(&tmdb, &tvdb);

        let meta = r
            .resolve_movie("Example", None, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.provider, "tvdb");
        assert!(tmdb.calls().is_empty());
        assert_eq!(r.provider_names(QueryKind::Movie), vec!["tvdb"]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_call() {
        let tmdb = FakeProvider::new("tmdb", Some("x"));
        let tvdb = FakeProvider::new("tvdb", Some("y"));
        let r = resolver(&tmdb, &tvdb);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = r.resolve_movie("Example", None, &cancel).await.unwrap_err();
        assert!(matches!(err, MetadataError::Cancelled));
        assert!(tmdb.calls().is_empty());
    }

    #[tokio::test]
    async fn image_download_tries_chain_in_order() {
        let tmdb = FakeProvider::new("tmdb", None);
        let tvdb = FakeProvider::new("tvdb", Some("png"));
        let r = resolver(&tmdb, &tvdb);

        let bytes = r
            .download_image("https://img/x.jpg", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(bytes.as_deref(), Some(b"png".as_slice()));
        assert_eq!(tmdb.calls(), vec!["image"]);
    }

    #[test]
    fn unknown_providers_are_appended() {
        let extra = FakeProvider::new("omdb", None);
        let tmdb = FakeProvider::new("tmdb", None);
        let r = MetadataResolver::new(vec![extra as Arc<dyn MetadataProvider>, tmdb]);
        let names: Vec<_> = r.chain(QueryKind::Series).iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["tmdb", "omdb"]);
    }
}
