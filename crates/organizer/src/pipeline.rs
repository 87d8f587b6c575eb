//! File-to-library pipeline.
//!
//! One call to [`Organizer::process_file`] walks a single path through
//! filtering, parsing, the deduplication gate, metadata lookup, placement
//! and bookkeeping. Failures stay contained to the file being processed;
//! only cancellation and persistence failures escape as `Err`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use mediasort_core::config::dotted_extension;
use mediasort_core::{ContentFingerprint, ItemKind, ProcessingStatus, Settings};
use mediasort_db::repo::media_items::{self, MediaItemRow, NewMediaItem};
use mediasort_db::repo::pending_files::{self, NewPendingFile, PendingIdentity};
use mediasort_db::repo::processed_files::{self, NewProcessedFile, ProcessedFileRow};
use mediasort_metadata::{MediaMetadata, MetadataError, MetadataResolver, QueryKind};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::artwork::{ImageOptimizer, ImageOutput, ResizingOptimizer};
use crate::companions::{CompanionKind, discover_companions};
use crate::dedup::{Decision, DeduplicationGate};
use crate::filter::{self, FileClass};
use crate::notify::{Notifier, NullNotifier};
use crate::parser::{self, MediaKind, ParsedName};
use crate::placement::{self, PlaceError, Placement};
use crate::status::{StatusEntry, StatusLog};
use crate::{OrganizeError, hasher, walk};

const POSTER_FILE: &str = "poster.jpg";

/// Terminal record of one pipeline run for one file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOutcome {
    pub source_path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub media_item_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Not a video, or inside the incomplete-downloads directory.
    Filtered(FileClass),
    /// Filename carries no year or episode marker.
    Unrecognized,
    AlreadyProcessed,
    Processed(ProcessingOutcome),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// `success + error + skipped`.
    pub total: usize,
    pub success: usize,
    pub error: usize,
    /// Byte-identical duplicates of organized content.
    pub skipped: usize,
    /// Paths that already had a completed record. Not part of `total`.
    pub unchanged: usize,
}

impl BatchSummary {
    fn add(&mut self, status: ProcessingStatus) {
        self.total += 1;
        match status {
            ProcessingStatus::Success => self.success += 1,
            ProcessingStatus::Error => self.error += 1,
            ProcessingStatus::SkippedDuplicate => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovedKind {
    Movie,
    Episode,
}

/// Identity supplied by a reviewer instead of being read from the filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedMedia {
    pub kind: ApprovedKind,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
}

/// Files in an organized library sharing one fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub size_bytes: i64,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Movie {
        title: String,
        year: Option<i32>,
    },
    Episode {
        title: String,
        year: Option<i32>,
        season: u32,
        episode: u32,
    },
}

impl Target {
    fn from_parsed(parsed: &ParsedName) -> Option<Self> {
        match parsed.kind {
            MediaKind::Movie => Some(Self::Movie {
                title: parsed.title.clone(),
                year: parsed.year,
            }),
            MediaKind::Episode => Some(Self::Episode {
                title: parsed.title.clone(),
                year: parsed.year,
                season: parsed.season.unwrap_or(1),
                episode: parsed.episode.unwrap_or(1),
            }),
            MediaKind::Unknown => None,
        }
    }

    fn from_approved(approved: &ApprovedMedia) -> Self {
        let title = approved.title.trim().to_string();
        match approved.kind {
            ApprovedKind::Movie => Self::Movie {
                title,
                year: approved.year,
            },
            ApprovedKind::Episode => Self::Episode {
                title,
                year: approved.year,
                season: approved.season.filter(|s| *s > 0).unwrap_or(1),
                episode: approved.episode.filter(|e| *e > 0).unwrap_or(1),
            },
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Movie { title, year } => describe(title, *year),
            Self::Episode {
                title,
                season,
                episode,
                ..
            } => episode_label(title, *season, *episode),
        }
    }

    fn identity(&self) -> PendingIdentity {
        match self {
            Self::Movie { title, year } => PendingIdentity {
                title: title.clone(),
                year: year.map(i64::from),
                media_kind: "movie".into(),
                season: None,
                episode: None,
            },
            Self::Episode {
                title,
                year,
                season,
                episode,
            } => PendingIdentity {
                title: title.clone(),
                year: year.map(i64::from),
                media_kind: "episode".into(),
                season: Some(i64::from(*season)),
                episode: Some(i64::from(*episode)),
            },
        }
    }

    fn item_kind(&self) -> ItemKind {
        match self {
            Self::Movie { .. } => ItemKind::Movie,
            Self::Episode { .. } => ItemKind::Episode,
        }
    }
}

fn describe(title: &str, year: Option<i32>) -> String {
    match year {
        Some(y) => format!("{title} ({y})"),
        None => title.to_string(),
    }
}

fn episode_label(title: &str, season: u32, episode: u32) -> String {
    format!("{title} - S{season:02}E{episode:02}")
}

struct Placed {
    destination: PathBuf,
    media_item_id: String,
    label: String,
}

pub struct Organizer {
    settings: Arc<Settings>,
    pool: SqlitePool,
    resolver: Arc<MetadataResolver>,
    optimizer: Arc<dyn ImageOptimizer>,
    notifier: Arc<dyn Notifier>,
    status: Arc<StatusLog>,
    gate: DeduplicationGate,
}

impl Organizer {
    pub fn new(settings: Arc<Settings>, pool: SqlitePool, resolver: Arc<MetadataResolver>) -> Self {
        let gate = DeduplicationGate::new(
            pool.clone(),
            settings.database.skip_processed_files,
            settings.database.check_for_duplicates,
        );
        Self {
            settings,
            pool,
            resolver,
            optimizer: Arc::new(ResizingOptimizer),
            notifier: Arc::new(NullNotifier),
            status: Arc::new(StatusLog::default()),
            gate,
        }
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn ImageOptimizer>) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status_log(&self) -> Arc<StatusLog> {
        self.status.clone()
    }

    pub async fn process_file(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileOutcome, OrganizeError> {
        if cancel.is_cancelled() {
            return Err(OrganizeError::Cancelled);
        }

        let class = filter::classify(&self.settings, path);
        if class != FileClass::Video {
            debug!(path = %path.display(), class = class.as_str(), "skipping file");
            return Ok(FileOutcome::Filtered(class));
        }

        let parsed = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(parser::parse_filename);
        let Some(target) = parsed.as_ref().and_then(Target::from_parsed) else {
            debug!(path = %path.display(), "unrecognized filename, queued for review");
            self.queue_for_review(path, "unrecognized filename", None).await?;
            return Ok(FileOutcome::Unrecognized);
        };

        let gate = self.gate.check(path, cancel).await?;
        match gate.decision {
            Decision::AlreadyProcessed => Ok(FileOutcome::AlreadyProcessed),
            Decision::DuplicateOf(existing) => {
                let outcome = self
                    .record_duplicate(path, &target, &existing, gate.fingerprint)
                    .await?;
                Ok(FileOutcome::Processed(outcome))
            }
            Decision::New => {
                let outcome = self.organize(path, &target, gate.fingerprint, cancel).await?;
                Ok(FileOutcome::Processed(outcome))
            }
        }
    }

    /// Organize every file under `root`, depth first. One file's failure
    /// never stops the batch.
    pub async fn process_directory(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<BatchSummary, OrganizeError> {
        let files = list_files(root, cancel).await?;
        info!(root = %root.display(), files = files.len(), "processing directory");

        let mut summary = BatchSummary::default();
        for file in &files {
            match self.process_file(file, cancel).await {
                Ok(FileOutcome::Processed(outcome)) => summary.add(outcome.status),
                Ok(FileOutcome::AlreadyProcessed) => summary.unchanged += 1,
                Ok(FileOutcome::Filtered(_) | FileOutcome::Unrecognized) => {}
                Err(OrganizeError::Cancelled) => {
                    info!(root = %root.display(), "directory processing cancelled");
                    return Err(OrganizeError::Cancelled);
                }
                Err(e) => {
                    error!(path = %file.display(), error = %e, "file processing failed");
                    summary.add(ProcessingStatus::Error);
                }
            }
        }

        if summary.total > 0 {
            self.notifier
                .notify_batch_completion(summary.total, summary.success, summary.error)
                .await;
        }
        info!(
            root = %root.display(),
            total = summary.total,
            success = summary.success,
            error = summary.error,
            skipped = summary.skipped,
            unchanged = summary.unchanged,
            "directory processed"
        );
        Ok(summary)
    }

    /// Organize `path` under an identity chosen by a reviewer. The source is
    /// removed once it has been placed successfully.
    pub async fn process_approved(
        &self,
        path: &Path,
        approved: &ApprovedMedia,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutcome, OrganizeError> {
        if approved.title.trim().is_empty() {
            return Err(OrganizeError::Parse("approved title is empty".into()));
        }
        tokio::fs::metadata(path).await?;

        let target = Target::from_approved(approved);
        let fingerprint = match hasher::fingerprint(path, cancel).await {
            Ok(fp) => Some(fp),
            Err(OrganizeError::Cancelled) => return Err(OrganizeError::Cancelled),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hashing failed, continuing without fingerprint");
                None
            }
        };

        let outcome = self.organize(path, &target, fingerprint, cancel).await?;
        if outcome.status == ProcessingStatus::Success {
            pending_files::mark_matched(&self.pool, &path.to_string_lossy(), &target.identity())
                .await?;
            match tokio::fs::remove_file(path).await {
                Ok(()) => info!(path = %path.display(), "removed approved source"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove approved source"),
            }
        }
        Ok(outcome)
    }

    /// Report byte-identical video files under an organized root. Nothing is
    /// deleted.
    pub async fn scan_for_duplicates(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<DuplicateGroup>, OrganizeError> {
        let files = list_files(root, cancel).await?;
        let mut by_fingerprint: HashMap<ContentFingerprint, Vec<PathBuf>> = HashMap::new();

        for file in files {
            if !self.settings.extensions.is_video(&dotted_extension(&file)) {
                continue;
            }
            match hasher::fingerprint(&file, cancel).await {
                Ok(fp) => by_fingerprint.entry(fp).or_default().push(file),
                Err(OrganizeError::Cancelled) => return Err(OrganizeError::Cancelled),
                Err(e) => warn!(path = %file.display(), error = %e, "could not fingerprint file"),
            }
        }

        let mut groups: Vec<DuplicateGroup> = by_fingerprint
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(fp, mut paths)| {
                paths.sort();
                DuplicateGroup {
                    hash: fp.hash_hex(),
                    size_bytes: fp.size_bytes,
                    paths,
                }
            })
            .collect();
        groups.sort_by(|a, b| a.paths.cmp(&b.paths));

        for group in &groups {
            warn!(
                hash = %group.hash,
                size_bytes = group.size_bytes,
                count = group.paths.len(),
                paths = ?group.paths,
                "duplicate files in library"
            );
        }
        info!(root = %root.display(), groups = groups.len(), "duplicate sweep finished");
        Ok(groups)
    }

    /// Look a title up the way the pipeline would, for a reviewer choosing
    /// an identity by hand.
    pub async fn search_metadata(
        &self,
        kind: QueryKind,
        title: &str,
        year: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaMetadata>, OrganizeError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(OrganizeError::Parse("search title is empty".into()));
        }
        match self.lookup(kind, title, year, cancel).await {
            Ok(meta) => Ok(Some(meta)),
            Err(OrganizeError::MetadataNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn queue_for_review(
        &self,
        path: &Path,
        reason: &str,
        target: Option<&Target>,
    ) -> Result<(), OrganizeError> {
        let size_bytes = tokio::fs::metadata(path)
            .await
            .map(|m| m.len() as i64)
            .unwrap_or(0);
        let row = pending_files::queue_pending(
            &self.pool,
            &NewPendingFile {
                file_path: path.to_string_lossy().into_owned(),
                size_bytes,
                reason: Some(reason.to_string()),
                identity: target.map(Target::identity),
            },
        )
        .await?;
        debug!(path = %path.display(), pending_id = %row.id, status = %row.status, "review queue updated");
        Ok(())
    }

    async fn organize(
        &self,
        path: &Path,
        target: &Target,
        fingerprint: Option<ContentFingerprint>,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutcome, OrganizeError> {
        let source = path.to_string_lossy().into_owned();

        match self.place(path, target, cancel).await {
            Ok(placed) => {
                let destination = placed.destination.to_string_lossy().into_owned();
                self.record(
                    path,
                    fingerprint,
                    ProcessingStatus::Success,
                    &destination,
                    None,
                    Some(placed.media_item_id.clone()),
                )
                .await?;
                info!(source = %source, destination = %destination, title = %placed.label, "organized");

                self.log_status(path, Some(&destination), ProcessingStatus::Success, &placed.label, target, None);
                self.notifier
                    .notify_success(&placed.label, &source, &destination)
                    .await;

                Ok(ProcessingOutcome {
                    source_path: path.to_path_buf(),
                    destination_path: Some(placed.destination),
                    status: ProcessingStatus::Success,
                    error_message: None,
                    media_item_id: Some(placed.media_item_id),
                    title: Some(placed.label),
                })
            }
            Err(OrganizeError::Cancelled) => {
                debug!(path = %path.display(), "processing cancelled");
                Err(OrganizeError::Cancelled)
            }
            Err(e) => {
                let message = e.to_string();
                let label = target.label();
                match &e {
                    OrganizeError::MetadataNotFound(_) => {
                        warn!(path = %path.display(), title = %label, "no metadata found")
                    }
                    _ => error!(path = %path.display(), title = %label, error = %e, "processing failed"),
                }

                self.record(path, fingerprint, ProcessingStatus::Error, "", Some(message.clone()), None)
                    .await?;
                if matches!(e, OrganizeError::MetadataNotFound(_)) {
                    self.queue_for_review(path, &message, Some(target)).await?;
                }
                self.log_status(path, None, ProcessingStatus::Error, &label, target, Some(&message));
                self.notifier.notify_error(&label, &source, &message).await;

                Ok(ProcessingOutcome {
                    source_path: path.to_path_buf(),
                    destination_path: None,
                    status: ProcessingStatus::Error,
                    error_message: Some(message),
                    media_item_id: None,
                    title: Some(label),
                })
            }
        }
    }

    async fn place(
        &self,
        path: &Path,
        target: &Target,
        cancel: &CancellationToken,
    ) -> Result<Placed, OrganizeError> {
        let ext = dotted_extension(path);

        match target {
            Target::Movie { title, year } => {
                let meta = self.lookup(QueryKind::Movie, title, *year, cancel).await?;
                let year = meta.year.or(*year);
                let base = placement::base_name(&meta.title, year);
                let folder = self.settings.movies_dir.join(&base);
                let destination =
                    placement::movie_destination(&self.settings.movies_dir, &meta.title, year, &ext);

                // A failed catalog write leaves nothing placed.
                let item = self.catalog_movie(&meta, year).await?;

                self.copy_primary(path, &destination, cancel).await?;
                if let Some(url) = &meta.poster_url {
                    self.save_poster(url, &folder, true, cancel).await?;
                }
                self.copy_companions(path, &folder, &base, cancel).await?;

                Ok(Placed {
                    destination,
                    media_item_id: item.id,
                    label: meta.title,
                })
            }
            Target::Episode {
                title,
                year,
                season,
                episode,
            } => {
                let meta = self.lookup(QueryKind::Series, title, *year, cancel).await?;
                let year = meta.year.or(*year);
                let base = placement::base_name(&meta.title, year);
                let show_folder = self.settings.tv_dir.join(&base);
                let season_folder = show_folder.join(format!("Season {season:02}"));
                let destination = placement::episode_destination(
                    &self.settings.tv_dir,
                    &meta.title,
                    year,
                    *season,
                    *episode,
                    &ext,
                );

                let item = self.catalog_episode(&meta, year, *season, *episode).await?;

                self.copy_primary(path, &destination, cancel).await?;
                if let Some(url) = &meta.poster_url {
                    self.save_poster(url, &show_folder, false, cancel).await?;
                }
                let episode_base = format!("{base} - s{season:02}e{episode:02}");
                self.copy_companions(path, &season_folder, &episode_base, cancel)
                    .await?;

                Ok(Placed {
                    destination,
                    media_item_id: item.id,
                    label: episode_label(&meta.title, *season, *episode),
                })
            }
        }
    }

    async fn lookup(
        &self,
        kind: QueryKind,
        title: &str,
        year: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<MediaMetadata, OrganizeError> {
        match self.resolver.resolve(kind, title, year, cancel).await {
            Ok(Some(meta)) => Ok(meta),
            Ok(None) => Err(OrganizeError::MetadataNotFound(describe(title, year))),
            Err(MetadataError::Cancelled) => Err(OrganizeError::Cancelled),
            Err(e) => Err(OrganizeError::MetadataNotFound(format!(
                "{}: {e}",
                describe(title, year)
            ))),
        }
    }

    async fn copy_primary(
        &self,
        src: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), OrganizeError> {
        match placement::place_file(src, dest, cancel).await? {
            Placement::Copied => debug!(source = %src.display(), destination = %dest.display(), "copied"),
            Placement::AlreadyPresent => {
                info!(destination = %dest.display(), "destination already exists, not copying")
            }
        }
        Ok(())
    }

    /// Artwork is best effort: only cancellation is reported.
    async fn save_poster(
        &self,
        url: &str,
        folder: &Path,
        replace: bool,
        cancel: &CancellationToken,
    ) -> Result<(), OrganizeError> {
        let poster = folder.join(POSTER_FILE);
        if !replace && tokio::fs::try_exists(&poster).await.unwrap_or(false) {
            return Ok(());
        }

        let bytes = match self.resolver.download_image(url, cancel).await {
            Ok(Some(bytes)) if !bytes.is_empty() => bytes,
            Ok(_) => {
                warn!(url, "poster download returned no data");
                return Ok(());
            }
            Err(MetadataError::Cancelled) => return Err(OrganizeError::Cancelled),
            Err(e) => {
                warn!(url, error = %e, "poster download failed");
                return Ok(());
            }
        };

        let optimized = self
            .optimizer
            .optimize(
                bytes,
                self.settings.image.max_width,
                self.settings.image.max_height,
                ImageOutput::Jpeg,
            )
            .await;
        match placement::write_bytes(&poster, &optimized).await {
            Ok(()) => info!(path = %poster.display(), "saved poster"),
            Err(e) => warn!(path = %poster.display(), error = %e, "could not save poster"),
        }
        Ok(())
    }

    /// Companions are best effort: only cancellation is reported.
    async fn copy_companions(
        &self,
        video: &Path,
        folder: &Path,
        base: &str,
        cancel: &CancellationToken,
    ) -> Result<(), OrganizeError> {
        for companion in discover_companions(video, &self.settings.extensions) {
            if cancel.is_cancelled() {
                return Err(OrganizeError::Cancelled);
            }
            let dest = folder.join(companion.destination_name(base));
            let result = match companion.kind {
                CompanionKind::Subtitle => placement::place_file(&companion.path, &dest, cancel)
                    .await
                    .map(|_| ()),
                CompanionKind::Image => self.place_image(&companion.path, &dest).await,
            };
            match result {
                Ok(()) => debug!(companion = %companion.path.display(), destination = %dest.display(), "companion placed"),
                Err(PlaceError::Cancelled) => return Err(OrganizeError::Cancelled),
                Err(e) => {
                    warn!(companion = %companion.path.display(), error = %e, "could not place companion")
                }
            }
        }
        Ok(())
    }

    async fn place_image(&self, src: &Path, dest: &Path) -> Result<(), PlaceError> {
        if tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Ok(());
        }
        let bytes = tokio::fs::read(src).await.map_err(|source| PlaceError::Io {
            path: src.to_path_buf(),
            source,
        })?;
        let optimized = self
            .optimizer
            .optimize(
                bytes,
                self.settings.image.max_width,
                self.settings.image.max_height,
                ImageOutput::SameFormat,
            )
            .await;
        placement::write_bytes(dest, &optimized).await
    }

    async fn catalog_movie(
        &self,
        meta: &MediaMetadata,
        year: Option<i32>,
    ) -> Result<MediaItemRow, sqlx::Error> {
        let year = year.map(i64::from);
        if let Some(item) =
            media_items::find_media_item(&self.pool, &meta.title, year, ItemKind::Movie).await?
        {
            return Ok(item);
        }
        let item = catalog_entry(ItemKind::Movie, meta, year);
        media_items::add_media_item(&self.pool, &item).await
    }

    async fn catalog_episode(
        &self,
        meta: &MediaMetadata,
        year: Option<i32>,
        season: u32,
        episode: u32,
    ) -> Result<MediaItemRow, sqlx::Error> {
        let year = year.map(i64::from);
        let series =
            match media_items::find_media_item(&self.pool, &meta.title, year, ItemKind::Series)
                .await?
            {
                Some(series) => series,
                None => {
                    let entry = catalog_entry(ItemKind::Series, meta, year);
                    media_items::add_media_item(&self.pool, &entry).await?
                }
            };

        let (season, episode) = (i64::from(season), i64::from(episode));
        if let Some(item) =
            media_items::find_episode(&self.pool, &meta.title, year, season, episode).await?
        {
            return Ok(item);
        }
        let mut entry = NewMediaItem::new(ItemKind::Episode, &meta.title, year);
        entry.season = Some(season);
        entry.episode = Some(episode);
        entry.parent_id = Some(series.id);
        media_items::add_media_item(&self.pool, &entry).await
    }

    async fn record(
        &self,
        path: &Path,
        fingerprint: Option<ContentFingerprint>,
        status: ProcessingStatus,
        destination: &str,
        error_message: Option<String>,
        media_item_id: Option<String>,
    ) -> Result<(), OrganizeError> {
        let size_bytes = match fingerprint {
            Some(fp) => fp.size_bytes,
            None => tokio::fs::metadata(path)
                .await
                .map(|m| m.len() as i64)
                .unwrap_or(0),
        };
        processed_files::add_processed_file(
            &self.pool,
            &NewProcessedFile {
                source_path: path.to_string_lossy().into_owned(),
                destination_path: destination.to_string(),
                size_bytes,
                file_hash: fingerprint.map(|fp| fp.hash_hex()),
                status,
                error_message,
                media_item_id,
            },
        )
        .await?;
        Ok(())
    }

    async fn record_duplicate(
        &self,
        path: &Path,
        target: &Target,
        existing: &ProcessedFileRow,
        fingerprint: Option<ContentFingerprint>,
    ) -> Result<ProcessingOutcome, OrganizeError> {
        self.record(
            path,
            fingerprint,
            ProcessingStatus::SkippedDuplicate,
            &existing.destination_path,
            None,
            existing.media_item_id.clone(),
        )
        .await?;
        info!(
            path = %path.display(),
            original = %existing.source_path,
            destination = %existing.destination_path,
            "duplicate content, not copying"
        );

        let label = target.label();
        self.log_status(
            path,
            Some(&existing.destination_path),
            ProcessingStatus::SkippedDuplicate,
            &label,
            target,
            None,
        );
        Ok(ProcessingOutcome {
            source_path: path.to_path_buf(),
            destination_path: Some(PathBuf::from(&existing.destination_path)),
            status: ProcessingStatus::SkippedDuplicate,
            error_message: None,
            media_item_id: existing.media_item_id.clone(),
            title: Some(label),
        })
    }

    fn log_status(
        &self,
        path: &Path,
        destination: Option<&str>,
        status: ProcessingStatus,
        title: &str,
        target: &Target,
        error: Option<&str>,
    ) {
        self.status.record(StatusEntry {
            source_path: path.to_string_lossy().into_owned(),
            destination_path: destination.map(str::to_string),
            status,
            title: Some(title.to_string()),
            kind: Some(target.item_kind()),
            error: error.map(str::to_string),
            at: Utc::now(),
        });
    }
}

fn catalog_entry(kind: ItemKind, meta: &MediaMetadata, year: Option<i64>) -> NewMediaItem {
    let mut entry = NewMediaItem::new(kind, &meta.title, year);
    entry.overview = meta.overview.clone();
    entry.imdb_id = meta.imdb_id.clone();
    match meta.provider.as_str() {
        "tmdb" => entry.tmdb_id = meta.external_id.clone(),
        "tvdb" => entry.tvdb_id = meta.external_id.clone(),
        _ => {}
    }
    entry
}

async fn list_files(root: &Path, cancel: &CancellationToken) -> Result<Vec<PathBuf>, OrganizeError> {
    let root = root.to_path_buf();
    let token = cancel.clone();
    tokio::task::spawn_blocking(move || walk::collect_files(&root, &token))
        .await
        .map_err(|e| OrganizeError::Io(std::io::Error::other(e)))?
}
