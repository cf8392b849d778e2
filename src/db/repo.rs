use super::model::{favorite_from_row, FAVORITE_COLUMNS};
use crate::error::StorageError;
use crate::model::{FavoriteRecord, NewFavorite};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{instrument, warn};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool, StorageError> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    let parent = std::path::Path::new(&expanded_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!(%err, dir = %parent.display(), "failed to create database directory");
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// All favorites, newest `saved_at` first; insertion sequence breaks ties.
#[instrument(skip_all)]
pub async fn list_favorites(pool: &Pool) -> Result<Vec<FavoriteRecord>, StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT {FAVORITE_COLUMNS} FROM favorites ORDER BY saved_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    rows.iter()
        .map(|row| favorite_from_row(row).map_err(StorageError::from))
        .collect()
}

#[instrument(skip_all)]
pub async fn find_favorite(
    pool: &Pool,
    item_id: i64,
) -> Result<Option<FavoriteRecord>, StorageError> {
    let row = sqlx::query(&format!(
        "SELECT {FAVORITE_COLUMNS} FROM favorites WHERE item_id = ?"
    ))
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(favorite_from_row).transpose()?)
}

/// Insert a favorite. Returns `None` when a record for the same item already
/// exists; the existing row is left untouched.
#[instrument(skip_all)]
pub async fn insert_favorite(
    pool: &Pool,
    new: &NewFavorite,
    saved_at: DateTime<Utc>,
) -> Result<Option<FavoriteRecord>, StorageError> {
    let row = sqlx::query(&format!(
        "INSERT INTO favorites (item_id, author, descendant_count, score, created_at, title, kind, url, saved_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(item_id) DO NOTHING \
         RETURNING {FAVORITE_COLUMNS}"
    ))
    .bind(new.item_id)
    .bind(&new.author)
    .bind(new.descendant_count)
    .bind(new.score)
    .bind(new.created_at)
    .bind(&new.title)
    .bind(&new.kind)
    .bind(&new.url)
    .bind(saved_at)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(favorite_from_row).transpose()?)
}

/// Delete every record for `item_id`; returns the number of rows removed.
#[instrument(skip_all)]
pub async fn delete_favorite(pool: &Pool, item_id: i64) -> Result<u64, StorageError> {
    let res = sqlx::query("DELETE FROM favorites WHERE item_id = ?")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn clear_favorites(pool: &Pool) -> Result<u64, StorageError> {
    let res = sqlx::query("DELETE FROM favorites").execute(pool).await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn get_setting(pool: &Pool, key: &str) -> Result<Option<String>, StorageError> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip_all)]
pub async fn put_setting(pool: &Pool, key: &str, value: &str) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn new_favorite(item_id: i64) -> NewFavorite {
        NewFavorite {
            item_id,
            author: "alice".into(),
            descendant_count: 4,
            score: Some(12),
            created_at: Some(1_700_000_000),
            title: format!("title {item_id}"),
            kind: "story".into(),
            url: Some("https://example.com".into()),
        }
    }

    #[tokio::test]
    async fn insert_is_unique_per_item() {
        let pool = setup_pool().await;
        let t0 = Utc::now();
        let first = insert_favorite(&pool, &new_favorite(1), t0).await.unwrap();
        assert!(first.is_some());
        let second = insert_favorite(&pool, &new_favorite(1), t0 + Duration::seconds(5))
            .await
            .unwrap();
        assert!(second.is_none());

        let all = list_favorites(&pool).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].saved_at, first.unwrap().saved_at);
    }

    #[tokio::test]
    async fn list_orders_by_saved_at_then_sequence() {
        let pool = setup_pool().await;
        let t0 = Utc::now();
        insert_favorite(&pool, &new_favorite(1), t0).await.unwrap();
        insert_favorite(&pool, &new_favorite(2), t0 + Duration::seconds(1))
            .await
            .unwrap();
        // same timestamp as item 2: later insertion wins
        insert_favorite(&pool, &new_favorite(3), t0 + Duration::seconds(1))
            .await
            .unwrap();

        let ids: Vec<i64> = list_favorites(&pool)
            .await
            .unwrap()
            .iter()
            .map(|f| f.item_id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn find_delete_and_clear() {
        let pool = setup_pool().await;
        insert_favorite(&pool, &new_favorite(5), Utc::now()).await.unwrap();
        insert_favorite(&pool, &new_favorite(6), Utc::now()).await.unwrap();

        let found = find_favorite(&pool, 5).await.unwrap().unwrap();
        assert_eq!(found.title, "title 5");
        assert_eq!(found.url.as_deref(), Some("https://example.com"));

        assert_eq!(delete_favorite(&pool, 5).await.unwrap(), 1);
        assert_eq!(delete_favorite(&pool, 5).await.unwrap(), 0);
        assert!(find_favorite(&pool, 5).await.unwrap().is_none());

        assert_eq!(clear_favorites(&pool).await.unwrap(), 1);
        assert!(list_favorites(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_upsert() {
        let pool = setup_pool().await;
        assert!(get_setting(&pool, "load_limit").await.unwrap().is_none());
        put_setting(&pool, "load_limit", "20").await.unwrap();
        put_setting(&pool, "load_limit", "30").await.unwrap();
        assert_eq!(
            get_setting(&pool, "load_limit").await.unwrap().as_deref(),
            Some("30")
        );
    }

    #[test]
    fn prepare_sqlite_url_passes_memory_through() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(prepare_sqlite_url("postgres://x"), "postgres://x");
    }

    #[test]
    fn prepare_sqlite_url_adds_create_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/hnfeed.db");
        let url = prepare_sqlite_url(&format!("sqlite://{}", path.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", path.display()));
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    fn prepare_sqlite_url_keeps_existing_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.db");
        let url = prepare_sqlite_url(&format!("sqlite:{}?cache=shared", path.display()));
        assert_eq!(url, format!("sqlite://{}?cache=shared&mode=rwc", path.display()));
        let url = prepare_sqlite_url(&format!("sqlite://{}?mode=ro", path.display()));
        assert_eq!(url, format!("sqlite://{}?mode=ro", path.display()));
    }

    #[test]
    fn prepare_sqlite_url_survives_unwritable_parent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let path = blocker.join("hnfeed.db");
        let url = prepare_sqlite_url(&format!("sqlite://{}", path.display()));
        assert_eq!(url, format!("sqlite://{}?mode=rwc", path.display()));
        assert!(blocker.is_file());
    }
}
