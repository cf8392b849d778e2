//! Row mapping for repository queries.

use crate::model::FavoriteRecord;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub(crate) const FAVORITE_COLUMNS: &str =
    "id, item_id, author, descendant_count, score, created_at, title, kind, url, saved_at";

pub(crate) fn favorite_from_row(row: &SqliteRow) -> Result<FavoriteRecord, sqlx::Error> {
    Ok(FavoriteRecord {
        seq: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        author: row.try_get("author")?,
        descendant_count: row.try_get("descendant_count")?,
        score: row.try_get("score")?,
        created_at: row.try_get("created_at")?,
        title: row.try_get("title")?,
        kind: row.try_get("kind")?,
        url: row.try_get("url")?,
        saved_at: row.try_get::<DateTime<Utc>, _>("saved_at")?,
    })
}
