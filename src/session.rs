//! One reader session: the fetch cycle, the favorites mirror and user settings.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::db::Pool;
use crate::error::StorageError;
use crate::favorites::{FavoritesStore, SqliteFavorites};
use crate::feed::ItemSource;
use crate::model::{DateLocale, FavoriteRecord, Item};
use crate::pipeline;
use crate::settings::{validate_load_limit, Settings, SettingsError};

pub const FEED_ERROR_MESSAGE: &str = "Failed to fetch stories";

/// What the presentation layer reads after a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedState {
    pub items: Vec<Item>,
    pub is_loading: bool,
    /// Set only when the feed listing itself failed.
    pub error: Option<String>,
    /// Items omitted from `items` because their fetch failed.
    pub failed_items: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Published { items: usize, failed: usize },
    ListingFailed,
    /// A newer cycle started before this one finished; its result was dropped.
    Stale,
}

pub struct Session {
    source: Arc<dyn ItemSource>,
    favorites: FavoritesStore,
    pool: Pool,
    settings: RwLock<Settings>,
    concurrency: usize,
    feed: RwLock<FeedState>,
    generation: AtomicU64,
}

impl Session {
    pub fn new(
        source: Arc<dyn ItemSource>,
        favorites: FavoritesStore,
        pool: Pool,
        settings: Settings,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            favorites,
            pool,
            settings: RwLock::new(settings),
            concurrency: concurrency.max(1),
            feed: RwLock::new(FeedState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Build a session backed by `pool`, loading persisted settings and favorites.
    pub async fn open(
        source: Arc<dyn ItemSource>,
        pool: Pool,
        concurrency: usize,
    ) -> Result<Self, StorageError> {
        let settings = Settings::load(&pool).await?;
        let favorites = FavoritesStore::open(Arc::new(SqliteFavorites::new(pool.clone()))).await?;
        Ok(Self::new(source, favorites, pool, settings, concurrency))
    }

    /// Run one fetch cycle and publish its result unless a newer cycle has
    /// started in the meantime.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut feed = self.feed.write().await;
            feed.is_loading = true;
            feed.error = None;
            feed.items.clear();
            feed.failed_items = 0;
        }
        let limit = self.settings.read().await.load_limit;

        let ids = match self.source.list_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                error!(%err, generation, "failed to fetch feed");
                let mut feed = self.feed.write().await;
                if !self.is_current(generation) {
                    debug!(generation, "discarding stale listing failure");
                    return RefreshOutcome::Stale;
                }
                feed.error = Some(FEED_ERROR_MESSAGE.to_string());
                feed.is_loading = false;
                return RefreshOutcome::ListingFailed;
            }
        };

        let batch = pipeline::fetch_batch(self.source.as_ref(), &ids, limit, self.concurrency).await;

        let mut feed = self.feed.write().await;
        if !self.is_current(generation) {
            debug!(generation, "discarding stale batch");
            return RefreshOutcome::Stale;
        }
        let outcome = RefreshOutcome::Published {
            items: batch.items.len(),
            failed: batch.failed,
        };
        info!(
            generation,
            items = batch.items.len(),
            failed = batch.failed,
            "feed refreshed"
        );
        feed.items = batch.items;
        feed.failed_items = batch.failed;
        feed.is_loading = false;
        outcome
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    pub async fn feed(&self) -> FeedState {
        self.feed.read().await.clone()
    }

    pub async fn items(&self) -> Vec<Item> {
        self.feed.read().await.items.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.feed.read().await.is_loading
    }

    pub async fn error(&self) -> Option<String> {
        self.feed.read().await.error.clone()
    }

    pub async fn favorites(&self) -> Vec<FavoriteRecord> {
        self.favorites.list().await
    }

    pub async fn is_favorite(&self, item_id: i64) -> bool {
        self.favorites.contains(item_id).await
    }

    pub async fn save_favorite(&self, item: &Item) -> bool {
        self.favorites.save(item).await
    }

    pub async fn remove_favorite(&self, item_id: i64) -> bool {
        self.favorites.remove(item_id).await
    }

    /// Save if absent, remove if present. Returns whether the item is now a favorite.
    pub async fn toggle_favorite(&self, item: &Item) -> bool {
        if self.favorites.contains(item.id).await {
            self.favorites.remove(item.id).await;
        } else {
            self.favorites.save(item).await;
        }
        self.favorites.contains(item.id).await
    }

    pub async fn clear_favorites(&self) -> bool {
        self.favorites.clear().await
    }

    pub async fn settings(&self) -> Settings {
        *self.settings.read().await
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Persist first; the in-memory value changes only if the write succeeded.
    pub async fn set_load_limit(&self, limit: usize) -> Result<(), SettingsError> {
        let limit = validate_load_limit(limit)?;
        let mut settings = self.settings.write().await;
        Settings::persist_load_limit(&self.pool, limit).await?;
        settings.load_limit = limit;
        Ok(())
    }

    pub async fn set_date_locale(&self, locale: DateLocale) -> Result<(), SettingsError> {
        let mut settings = self.settings.write().await;
        Settings::persist_date_locale(&self.pool, locale).await?;
        settings.date_locale = locale;
        Ok(())
    }

    pub async fn set_enters_reader(&self, enabled: bool) -> Result<(), SettingsError> {
        let mut settings = self.settings.write().await;
        Settings::persist_enters_reader(&self.pool, enabled).await?;
        settings.enters_reader = enabled;
        Ok(())
    }
}
