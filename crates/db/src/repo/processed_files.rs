use mediasort_core::ProcessingStatus;
use sqlx::SqlitePool;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessedFileRow {
    pub id: String,
    pub source_path: String,
    pub destination_path: String,
    pub size_bytes: i64,
    pub file_hash: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub media_item_id: Option<String>,
    pub processed_ts: i64,
}

/// One processing outcome about to be recorded.
#[derive(Debug, Clone)]
pub struct NewProcessedFile {
    pub source_path: String,
    pub destination_path: String,
    pub size_bytes: i64,
    pub file_hash: Option<String>,
    pub status: ProcessingStatus,
    pub error_message: Option<String>,
    pub media_item_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub success: i64,
    pub error: i64,
    pub skipped_duplicate: i64,
}

type ProcessedTuple = (
    String,
    String,
    String,
    i64,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    i64,
);

const PROCESSED_COLUMNS: &str = "id, source_path, destination_path, size_bytes, file_hash, \
     status, error_message, media_item_id, processed_ts";

/// True when `source_path` already has a completed record. Error records
/// do not count, so failed files are retried on the next scan.
pub async fn has_been_processed(pool: &SqlitePool, source_path: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT 1 FROM processed_file \
         WHERE source_path = ? AND status IN ('success', 'skipped_duplicate') LIMIT 1",
    )
    .bind(source_path)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

/// Earliest successful placement with this content hash.
pub async fn find_by_hash(
    pool: &SqlitePool,
    file_hash: &str,
) -> Result<Option<ProcessedFileRow>, sqlx::Error> {
    let row: Option<ProcessedTuple> = sqlx::query_as(&format!(
        "SELECT {PROCESSED_COLUMNS} FROM processed_file \
         WHERE file_hash = ? AND status = 'success' AND destination_path != '' \
         ORDER BY processed_ts ASC, rowid ASC LIMIT 1"
    ))
    .bind(file_hash)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_processed))
}

pub async fn add_processed_file(
    pool: &SqlitePool,
    record: &NewProcessedFile,
) -> Result<ProcessedFileRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO processed_file (id, source_path, destination_path, size_bytes, file_hash, \
         status, error_message, media_item_id, processed_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&record.source_path)
    .bind(&record.destination_path)
    .bind(record.size_bytes)
    .bind(&record.file_hash)
    .bind(record.status.as_str())
    .bind(&record.error_message)
    .bind(&record.media_item_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ProcessedFileRow {
        id,
        source_path: record.source_path.clone(),
        destination_path: record.destination_path.clone(),
        size_bytes: record.size_bytes,
        file_hash: record.file_hash.clone(),
        status: record.status.as_str().to_string(),
        error_message: record.error_message.clone(),
        media_item_id: record.media_item_id.clone(),
        processed_ts: now,
    })
}

/// Most recent records first.
pub async fn list_recent(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<ProcessedFileRow>, sqlx::Error> {
    let rows: Vec<ProcessedTuple> = sqlx::query_as(&format!(
        "SELECT {PROCESSED_COLUMNS} FROM processed_file \
         ORDER BY processed_ts DESC, rowid DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(row_to_processed).collect())
}

pub async fn status_counts(pool: &SqlitePool) -> Result<StatusCounts, sqlx::Error> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM processed_file GROUP BY status")
            .fetch_all(pool)
            .await?;

    let mut counts = StatusCounts::default();
    for (status, n) in rows {
        match ProcessingStatus::parse(&status) {
            Some(ProcessingStatus::Success) => counts.success = n,
            Some(ProcessingStatus::Error) => counts.error = n,
            Some(ProcessingStatus::SkippedDuplicate) => counts.skipped_duplicate = n,
            None => {}
        }
    }
    Ok(counts)
}

fn row_to_processed(r: ProcessedTuple) -> ProcessedFileRow {
    ProcessedFileRow {
        id: r.0,
        source_path: r.1,
        destination_path: r.2,
        size_bytes: r.3,
        file_hash: r.4,
        status: r.5,
        error_message: r.6,
        media_item_id: r.7,
        processed_ts: r.8,
    }
}
