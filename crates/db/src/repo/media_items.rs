use mediasort_core::ItemKind;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct MediaItemRow {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub year: Option<i64>,
    pub overview: Option<String>,
    pub tmdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub imdb_id: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub parent_id: Option<String>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

/// Fields for a catalog entry that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewMediaItem {
    pub kind: ItemKind,
    pub title: String,
    pub year: Option<i64>,
    pub overview: Option<String>,
    pub tmdb_id: Option<String>,
    pub tvdb_id: Option<String>,
    pub imdb_id: Option<String>,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub parent_id: Option<String>,
}

impl NewMediaItem {
    pub fn new(kind: ItemKind, title: impl Into<String>, year: Option<i64>) -> Self {
        Self {
            kind,
            title: title.into(),
            year,
            overview: None,
            tmdb_id: None,
            tvdb_id: None,
            imdb_id: None,
            season: None,
            episode: None,
            parent_id: None,
        }
    }
}

type ItemTuple = (
    String,
    String,
    String,
    Option<i64>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<String>,
    i64,
    i64,
);

const ITEM_COLUMNS: &str = "id, kind, title, year, overview, tmdb_id, tvdb_id, imdb_id, \
     season, episode, parent_id, created_ts, updated_ts";

pub async fn get_media_item(
    pool: &SqlitePool,
    item_id: &str,
) -> Result<Option<MediaItemRow>, sqlx::Error> {
    let row: Option<ItemTuple> =
        sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM media_item WHERE id = ?"))
            .bind(item_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(row_to_item))
}

/// Look up a movie or series by title (case-insensitive), year and kind.
/// A `None` year only matches entries stored without one.
pub async fn find_media_item(
    pool: &SqlitePool,
    title: &str,
    year: Option<i64>,
    kind: ItemKind,
) -> Result<Option<MediaItemRow>, sqlx::Error> {
    let row: Option<ItemTuple> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM media_item \
         WHERE kind = ? AND title = ? COLLATE NOCASE AND year IS ? \
         ORDER BY created_ts LIMIT 1"
    ))
    .bind(kind.as_str())
    .bind(title)
    .bind(year)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_item))
}

/// Look up an episode through its parent series.
pub async fn find_episode(
    pool: &SqlitePool,
    series_title: &str,
    series_year: Option<i64>,
    season: i64,
    episode: i64,
) -> Result<Option<MediaItemRow>, sqlx::Error> {
    let row: Option<ItemTuple> = sqlx::query_as(
        "SELECT e.id, e.kind, e.title, e.year, e.overview, e.tmdb_id, e.tvdb_id, e.imdb_id, \
         e.season, e.episode, e.parent_id, e.created_ts, e.updated_ts \
         FROM media_item e JOIN media_item s ON e.parent_id = s.id \
         WHERE e.kind = 'episode' AND s.kind = 'series' \
         AND s.title = ? COLLATE NOCASE AND s.year IS ? \
         AND e.season = ? AND e.episode = ? \
         ORDER BY e.created_ts LIMIT 1",
    )
    .bind(series_title)
    .bind(series_year)
    .bind(season)
    .bind(episode)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_item))
}

pub async fn add_media_item(
    pool: &SqlitePool,
    item: &NewMediaItem,
) -> Result<MediaItemRow, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        "INSERT INTO media_item (id, kind, title, year, overview, tmdb_id, tvdb_id, imdb_id, \
         season, episode, parent_id, created_ts, updated_ts) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(item.kind.as_str())
    .bind(&item.title)
    .bind(item.year)
    .bind(&item.overview)
    .bind(&item.tmdb_id)
    .bind(&item.tvdb_id)
    .bind(&item.imdb_id)
    .bind(item.season)
    .bind(item.episode)
    .bind(&item.parent_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(MediaItemRow {
        id,
        kind: item.kind.as_str().to_string(),
        title: item.title.clone(),
        year: item.year,
        overview: item.overview.clone(),
        tmdb_id: item.tmdb_id.clone(),
        tvdb_id: item.tvdb_id.clone(),
        imdb_id: item.imdb_id.clone(),
        season: item.season,
        episode: item.episode,
        parent_id: item.parent_id.clone(),
        created_ts: now,
        updated_ts: now,
    })
}

fn row_to_item(r: ItemTuple) -> MediaItemRow {
    MediaItemRow {
        id: r.0,
        kind: r.1,
        title: r.2,
        year: r.3,
        overview: r.4,
        tmdb_id: r.5,
        tvdb_id: r.6,
        imdb_id: r.7,
        season: r.8,
        episode: r.9,
        parent_id: r.10,
        created_ts: r.11,
        updated_ts: r.12,
    }
}
