//! Bounded-concurrency, order-preserving batch fetch.
//!
//! The first `limit` ids form the work set. Each id is fetched as an
//! independent unit with at most `concurrency` units in flight. Units finish
//! in any order; results are keyed by their original index and projected out
//! in ascending index order once every unit has finished. A failed unit is
//! logged and counted, never escalated.
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::feed::ItemSource;
use crate::model::{Item, ItemId};

/// Result of one unit of work.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(Item),
    Failed(FetchError),
}

/// Ordered items of one batch plus the number of units that were omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub items: Vec<Item>,
    pub failed: usize,
}

impl BatchOutcome {
    /// Restores work-set order from outcomes keyed by original index.
    pub fn from_indexed(outcomes: BTreeMap<usize, FetchOutcome>) -> Self {
        let mut batch = BatchOutcome::default();
        for (_, outcome) in outcomes {
            match outcome {
                FetchOutcome::Fetched(item) => batch.items.push(item),
                FetchOutcome::Failed(_) => batch.failed += 1,
            }
        }
        batch
    }
}

#[instrument(skip_all, fields(available = ids.len(), limit = limit, concurrency = concurrency))]
pub async fn fetch_batch(
    source: &dyn ItemSource,
    ids: &[ItemId],
    limit: usize,
    concurrency: usize,
) -> BatchOutcome {
    let work_set = &ids[..limit.min(ids.len())];
    if work_set.is_empty() {
        return BatchOutcome::default();
    }
    let in_flight = concurrency.clamp(1, work_set.len());

    let outcomes: BTreeMap<usize, FetchOutcome> = stream::iter(work_set.iter().copied().enumerate())
        .map(|(index, id)| async move {
            let outcome = match source.fetch_item(id).await {
                Ok(item) => FetchOutcome::Fetched(item),
                Err(err) => {
                    warn!(index, item_id = id.0, %err, "item fetch failed; omitting");
                    FetchOutcome::Failed(err)
                }
            };
            (index, outcome)
        })
        .buffer_unordered(in_flight)
        .collect()
        .await;

    let batch = BatchOutcome::from_indexed(outcomes);
    debug!(
        fetched = batch.items.len(),
        failed = batch.failed,
        "batch complete"
    );
    batch
}
