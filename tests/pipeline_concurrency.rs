use async_trait::async_trait;
use hnfeed::error::FetchError;
use hnfeed::feed::ItemSource;
use hnfeed::model::{Item, ItemId};
use hnfeed::pipeline::fetch_batch;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Counts simultaneous calls and scrambles completion order with per-id delays.
#[derive(Default)]
struct InstrumentedSource {
    failing: HashSet<i64>,
    not_found: HashSet<i64>,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: Arc<Mutex<Vec<i64>>>,
}

impl InstrumentedSource {
    fn new(failing: &[i64], not_found: &[i64]) -> Self {
        Self {
            failing: failing.iter().copied().collect(),
            not_found: not_found.iter().copied().collect(),
            ..Default::default()
        }
    }
}

fn delay_for(id: i64) -> Duration {
    // deterministic scramble in 1..=23 ms
    Duration::from_millis(((id * 7919) % 23 + 1) as u64)
}

#[async_trait]
impl ItemSource for InstrumentedSource {
    async fn list_ids(&self) -> Result<Vec<ItemId>, FetchError> {
        Ok(Vec::new())
    }

    async fn fetch_item(&self, id: ItemId) -> Result<Item, FetchError> {
        self.calls.lock().await.push(id.0);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(delay_for(id.0)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&id.0) {
            return Err(FetchError::Network("connection reset".into()));
        }
        if self.not_found.contains(&id.0) {
            return Err(FetchError::NotFound(id));
        }
        Ok(Item {
            id: id.0,
            author: "carol".into(),
            descendant_count: id.0,
            score: Some(id.0),
            created_at: Some(1_700_000_000),
            title: format!("item {}", id.0),
            kind: "story".into(),
            url: Some(format!("https://example.com/{}", id.0)),
        })
    }
}

#[tokio::test]
async fn order_preserved_under_scrambled_completion() {
    let ids: Vec<ItemId> = (100..130).map(ItemId).collect();
    let failing = [103, 111, 112, 129];
    let not_found = [120];
    let source = InstrumentedSource::new(&failing, &not_found);

    let batch = fetch_batch(&source, &ids, ids.len(), 4).await;

    let expected: Vec<i64> = (100..130)
        .filter(|id| !failing.contains(id) && !not_found.contains(id))
        .collect();
    let got: Vec<i64> = batch.items.iter().map(|i| i.id).collect();
    assert_eq!(got, expected);
    assert_eq!(batch.failed, 5);
    assert!(source.peak.load(Ordering::SeqCst) <= 4);
    assert!(source.peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn never_exceeds_limit_or_concurrency() {
    let ids: Vec<ItemId> = (1..=50).map(ItemId).collect();
    let source = InstrumentedSource::new(&[], &[]);

    let batch = fetch_batch(&source, &ids, 12, 3).await;

    assert_eq!(batch.items.len(), 12);
    let calls = source.calls.lock().await.clone();
    assert_eq!(calls.len(), 12);
    assert!(calls.iter().all(|id| *id <= 12));
    assert!(source.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn concurrency_above_work_set_is_capped() {
    let ids: Vec<ItemId> = (1..=5).map(ItemId).collect();
    let source = InstrumentedSource::new(&[2, 4], &[]);

    let batch = fetch_batch(&source, &ids, 5, 2).await;
    let got: Vec<i64> = batch.items.iter().map(|i| i.id).collect();
    assert_eq!(got, vec![1, 3, 5]);

    let source = InstrumentedSource::new(&[], &[]);
    let batch = fetch_batch(&source, &ids, 100, 64).await;
    assert_eq!(batch.items.len(), 5);
    assert!(source.peak.load(Ordering::SeqCst) <= 5);
}
