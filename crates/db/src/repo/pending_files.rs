use mediasort_core::PendingStatus;
use sqlx::SqlitePool;

#[derive(Debug, Clone, serde::Serialize)]
pub struct PendingFileRow {
    pub id: String,
    pub file_path: String,
    pub size_bytes: i64,
    pub status: String,
    pub reason: Option<String>,
    pub suggested_title: Option<String>,
    pub suggested_year: Option<i64>,
    pub media_kind: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub review_notes: Option<String>,
    pub detected_ts: i64,
    pub updated_ts: i64,
}

/// A best guess (or a reviewer's answer) for what a pending file is.
/// `media_kind` is `movie` or `episode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIdentity {
    pub title: String,
    pub year: Option<i64>,
    pub media_kind: String,
    pub season: Option<i64>,
    pub episode: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewPendingFile {
    pub file_path: String,
    pub size_bytes: i64,
    pub reason: Option<String>,
    pub identity: Option<PendingIdentity>,
}

type PendingTuple = (
    String,
    String,
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    i64,
    i64,
);

const PENDING_COLUMNS: &str = "id, file_path, size_bytes, status, reason, suggested_title, \
     suggested_year, media_kind, season, episode, review_notes, detected_ts, updated_ts";

/// Queue `file` for review. A path already queued keeps its id; while it is
/// still pending its size, reason and guess are refreshed. Entries a
/// reviewer already matched or rejected are left alone.
pub async fn queue_pending(
    pool: &SqlitePool,
    file: &NewPendingFile,
) -> Result<PendingFileRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();
    let identity = file.identity.as_ref();

    sqlx::query(
        "INSERT INTO pending_file (id, file_path, size_bytes, status, reason, suggested_title, \
         suggested_year, media_kind, season, episode, detected_ts, updated_ts) \
         VALUES (?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(file_path) DO UPDATE SET \
         size_bytes = excluded.size_bytes, reason = excluded.reason, \
         suggested_title = excluded.suggested_title, suggested_year = excluded.suggested_year, \
         media_kind = excluded.media_kind, season = excluded.season, \
         episode = excluded.episode, updated_ts = excluded.updated_ts \
         WHERE pending_file.status = 'pending'",
    )
    .bind(&id)
    .bind(&file.file_path)
    .bind(file.size_bytes)
    .bind(&file.reason)
    .bind(identity.map(|i| i.title.as_str()))
    .bind(identity.and_then(|i| i.year))
    .bind(identity.map(|i| i.media_kind.as_str()))
    .bind(identity.and_then(|i| i.season))
    .bind(identity.and_then(|i| i.episode))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_pending_by_path(pool, &file.file_path)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn get_pending(pool: &SqlitePool, id: &str) -> Result<Option<PendingFileRow>, sqlx::Error> {
    let row: Option<PendingTuple> =
        sqlx::query_as(&format!("SELECT {PENDING_COLUMNS} FROM pending_file WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(row_to_pending))
}

pub async fn get_pending_by_path(
    pool: &SqlitePool,
    file_path: &str,
) -> Result<Option<PendingFileRow>, sqlx::Error> {
    let row: Option<PendingTuple> = sqlx::query_as(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_file WHERE file_path = ?"
    ))
    .bind(file_path)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_pending))
}

/// Newest detections first, optionally only one status.
pub async fn list_pending(
    pool: &SqlitePool,
    status: Option<PendingStatus>,
    limit: i64,
) -> Result<Vec<PendingFileRow>, sqlx::Error> {
    let rows: Vec<PendingTuple> = match status {
        Some(status) => {
            sqlx::query_as(&format!(
                "SELECT {PENDING_COLUMNS} FROM pending_file WHERE status = ? \
                 ORDER BY detected_ts DESC, rowid DESC LIMIT ?"
            ))
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(&format!(
                "SELECT {PENDING_COLUMNS} FROM pending_file \
                 ORDER BY detected_ts DESC, rowid DESC LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows.into_iter().map(row_to_pending).collect())
}

/// Returns false when no entry has this id.
pub async fn set_pending_status(
    pool: &SqlitePool,
    id: &str,
    status: PendingStatus,
    notes: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE pending_file SET status = ?, review_notes = COALESCE(?, review_notes), \
         updated_ts = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(notes)
    .bind(chrono::Utc::now().timestamp())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark the entry for `file_path` matched under the identity a reviewer
/// confirmed. Returns false when the path was never queued.
pub async fn mark_matched(
    pool: &SqlitePool,
    file_path: &str,
    identity: &PendingIdentity,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE pending_file SET status = 'matched', suggested_title = ?, suggested_year = ?, \
         media_kind = ?, season = ?, episode = ?, updated_ts = ? WHERE file_path = ?",
    )
    .bind(&identity.title)
    .bind(identity.year)
    .bind(&identity.media_kind)
    .bind(identity.season)
    .bind(identity.episode)
    .bind(chrono::Utc::now().timestamp())
    .bind(file_path)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_pending(r: PendingTuple) -> PendingFileRow {
    PendingFileRow {
        id: r.0,
        file_path: r.1,
        size_bytes: r.2,
        status: r.3,
        reason: r.4,
        suggested_title: r.5,
        suggested_year: r.6,
        media_kind: r.7,
        season: r.8,
        episode: r.9,
        review_notes: r.10,
        detected_ts: r.11,
        updated_ts: r.12,
    }
}
