//! Persistent favorites with an in-memory mirror.
//!
//! The mirror is rebuilt from durable storage when the store is opened and is
//! then patched only after a durable write or delete succeeds. Every mutation
//! holds the mirror lock across its durable call, so saves and removes never
//! interleave.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::db::{self, Pool};
use crate::error::StorageError;
use crate::model::{FavoriteRecord, Item, NewFavorite};

/// Durable backing store for favorites.
#[async_trait]
pub trait FavoriteStorage: Send + Sync {
    /// All records, newest `saved_at` first.
    async fn load_all(&self) -> Result<Vec<FavoriteRecord>, StorageError>;

    async fn find(&self, item_id: i64) -> Result<Option<FavoriteRecord>, StorageError>;

    /// Returns `None` if the item is already stored.
    async fn insert(
        &self,
        new: &NewFavorite,
        saved_at: DateTime<Utc>,
    ) -> Result<Option<FavoriteRecord>, StorageError>;

    async fn delete(&self, item_id: i64) -> Result<u64, StorageError>;

    async fn clear(&self) -> Result<u64, StorageError>;
}

#[derive(Debug, Clone)]
pub struct SqliteFavorites {
    pool: Pool,
}

impl SqliteFavorites {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FavoriteStorage for SqliteFavorites {
    async fn load_all(&self) -> Result<Vec<FavoriteRecord>, StorageError> {
        db::list_favorites(&self.pool).await
    }

    async fn find(&self, item_id: i64) -> Result<Option<FavoriteRecord>, StorageError> {
        db::find_favorite(&self.pool, item_id).await
    }

    async fn insert(
        &self,
        new: &NewFavorite,
        saved_at: DateTime<Utc>,
    ) -> Result<Option<FavoriteRecord>, StorageError> {
        db::insert_favorite(&self.pool, new, saved_at).await
    }

    async fn delete(&self, item_id: i64) -> Result<u64, StorageError> {
        db::delete_favorite(&self.pool, item_id).await
    }

    async fn clear(&self) -> Result<u64, StorageError> {
        db::clear_favorites(&self.pool).await
    }
}

pub struct FavoritesStore {
    storage: Arc<dyn FavoriteStorage>,
    mirror: Mutex<Vec<FavoriteRecord>>,
}

impl FavoritesStore {
    /// Open the store and build the mirror from durable storage.
    pub async fn open(storage: Arc<dyn FavoriteStorage>) -> Result<Self, StorageError> {
        let mut records = storage.load_all().await?;
        records.sort_by(FavoriteRecord::listing_cmp);
        debug!(count = records.len(), "loaded favorites");
        Ok(Self {
            storage,
            mirror: Mutex::new(records),
        })
    }

    pub async fn list(&self) -> Vec<FavoriteRecord> {
        self.mirror.lock().await.clone()
    }

    pub async fn contains(&self, item_id: i64) -> bool {
        self.mirror.lock().await.iter().any(|r| r.item_id == item_id)
    }

    pub async fn len(&self) -> usize {
        self.mirror.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mirror.lock().await.is_empty()
    }

    /// Save `item`. Returns whether the mirror changed; saving an item that is
    /// already stored is a no-op and keeps its original `saved_at`.
    #[instrument(skip_all, fields(item_id = item.id))]
    pub async fn save(&self, item: &Item) -> bool {
        let mut mirror = self.mirror.lock().await;
        if mirror.iter().any(|r| r.item_id == item.id) {
            return false;
        }

        let new = NewFavorite::from(item);
        match self.storage.insert(&new, Utc::now()).await {
            Ok(Some(record)) => {
                insert_sorted(&mut mirror, record);
                true
            }
            Ok(None) => {
                // Durable row exists without a mirror entry; adopt it.
                match self.storage.find(item.id).await {
                    Ok(Some(record)) => {
                        insert_sorted(&mut mirror, record);
                        true
                    }
                    Ok(None) => false,
                    Err(err) => {
                        warn!(%err, "failed to read existing favorite");
                        false
                    }
                }
            }
            Err(err) => {
                warn!(%err, "failed to persist favorite; not applied");
                false
            }
        }
    }

    /// Remove every record for `item_id`. Returns whether the mirror changed.
    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: i64) -> bool {
        let mut mirror = self.mirror.lock().await;
        match self.storage.delete(item_id).await {
            Ok(_) => {
                let before = mirror.len();
                mirror.retain(|r| r.item_id != item_id);
                before != mirror.len()
            }
            Err(err) => {
                warn!(%err, "failed to delete favorite; not applied");
                false
            }
        }
    }

    /// Delete all favorites. The mirror is emptied only if the durable delete succeeds.
    #[instrument(skip_all)]
    pub async fn clear(&self) -> bool {
        let mut mirror = self.mirror.lock().await;
        match self.storage.clear().await {
            Ok(removed) => {
                debug!(removed, "cleared favorites");
                let changed = !mirror.is_empty();
                mirror.clear();
                changed
            }
            Err(err) => {
                warn!(%err, "failed to clear favorites; not applied");
                false
            }
        }
    }
}

fn insert_sorted(mirror: &mut Vec<FavoriteRecord>, record: FavoriteRecord) {
    // Normally index 0; a clock step backwards lands it further down.
    let pos = mirror.partition_point(|r| r.listing_cmp(&record).is_lt());
    mirror.insert(pos, record);
}
