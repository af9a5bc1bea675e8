//! Periodically refreshed USD spot price snapshot.
//!
//! The snapshot is replaced wholesale on every successful refresh. A failed refresh keeps
//! the last-known-good snapshot indefinitely; if the feed has never answered, a fallback
//! table of approximate reference prices is seeded so valuations never see an empty table.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::feed::{FeedPrices, PriceFeed};
use crate::error::{ValuationError, DIAGNOSTICS_TARGET};
use crate::utils::validate_usd_price;

/// Approximate reference prices, keyed by feed id, used only before the first good refresh.
pub const FALLBACK_PRICES: [(&str, f64); 3] = [
    ("usd-coin", 1.0),
    ("weth", 3_000.0),
    ("wrapped-bitcoin", 60_000.0),
];

/// Where the current snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SnapshotSource {
    /// No refresh has completed yet
    Empty,
    Feed,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricePoint {
    pub usd: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Immutable price table; a refresh swaps in a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    prices: FxHashMap<String, PricePoint>,
    source: SnapshotSource,
}

impl PriceSnapshot {
    pub fn empty() -> Self {
        Self {
            prices: FxHashMap::default(),
            source: SnapshotSource::Empty,
        }
    }

    /// Build a feed snapshot, dropping quotes that are missing or out of bounds.
    pub fn from_feed(quotes: FeedPrices, fetched_at: DateTime<Utc>) -> Self {
        let prices = quotes
            .into_iter()
            .filter_map(|(id, quote)| {
                let usd = validate_usd_price(quote.usd?)?;
                Some((id, PricePoint { usd, fetched_at }))
            })
            .collect();

        Self {
            prices,
            source: SnapshotSource::Feed,
        }
    }

    pub fn fallback(fetched_at: DateTime<Utc>) -> Self {
        let prices = FALLBACK_PRICES
            .iter()
            .map(|(id, usd)| (id.to_string(), PricePoint { usd: *usd, fetched_at }))
            .collect();

        Self {
            prices,
            source: SnapshotSource::Fallback,
        }
    }

    pub fn get(&self, key: &str) -> Option<&PricePoint> {
        self.prices.get(key)
    }

    pub fn usd(&self, key: &str) -> Option<f64> {
        self.prices.get(key).map(|p| p.usd)
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PricePoint)> {
        self.prices.iter()
    }
}

/// Result of a single refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// Feed failed; previous snapshot kept
    Retained,
    /// Feed failed with nothing to keep; fallback table installed
    SeededFallback,
}

struct RefreshTask {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Shared price cache with an explicit `start()`/`stop()` lifecycle.
///
/// Reads never wait on the feed: [`PriceCache::current_prices`] returns whatever snapshot
/// is installed at that instant.
pub struct PriceCache {
    feed: Arc<dyn PriceFeed>,
    clock: Arc<dyn Clock>,
    ids: Vec<String>,
    refresh_interval: Duration,
    snapshot: RwLock<Arc<PriceSnapshot>>,
    task: Mutex<Option<RefreshTask>>,
}

impl PriceCache {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        clock: Arc<dyn Clock>,
        ids: Vec<String>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            feed,
            clock,
            ids,
            refresh_interval,
            snapshot: RwLock::new(Arc::new(PriceSnapshot::empty())),
            task: Mutex::new(None),
        }
    }

    /// Latest snapshot. Never blocks on I/O.
    pub fn current_prices(&self) -> Arc<PriceSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn install(&self, snapshot: PriceSnapshot) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
    }

    /// Fetch `ids` from the feed and swap in the result.
    pub async fn refresh(&self, ids: &[String]) -> RefreshOutcome {
        let result = match self.feed.fetch_prices(ids).await {
            Ok(quotes) => {
                let snapshot = PriceSnapshot::from_feed(quotes, self.clock.now());
                if snapshot.is_empty() {
                    Err(ValuationError::FeedUnavailable(
                        "response contained no usable quotes".to_string(),
                    ))
                } else {
                    Ok(snapshot)
                }
            },
            Err(e) => Err(e),
        };

        match result {
            Ok(snapshot) => {
                info!("Price cache refreshed with {} quotes", snapshot.len());
                self.install(snapshot);
                RefreshOutcome::Updated
            },
            Err(e) => {
                warn!(target: DIAGNOSTICS_TARGET, "feed_unavailable error={}", e);

                if self.current_prices().source() == SnapshotSource::Empty {
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        "fallback_prices_seeded entries={}",
                        FALLBACK_PRICES.len()
                    );
                    self.install(PriceSnapshot::fallback(self.clock.now()));
                    RefreshOutcome::SeededFallback
                } else {
                    RefreshOutcome::Retained
                }
            },
        }
    }

    /// Spawn the background refresh loop. The first refresh runs immediately.
    ///
    /// Calling `start` on a running cache is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            warn!("Price cache already running, skipping start");
            return;
        }

        let cancel_token = CancellationToken::new();
        let worker_token = cancel_token.clone();
        let cache = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = worker_token.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.refresh(&cache.ids).await;
                    },
                }
            }
        });

        info!(
            "Price cache started for {} feed ids (every {}s)",
            self.ids.len(),
            self.refresh_interval.as_secs()
        );

        *task = Some(RefreshTask {
            cancel_token,
            handle,
        });
    }

    /// Stop the refresh loop and wait for it to exit. The last snapshot stays readable.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();

        if let Some(task) = task {
            task.cancel_token.cancel();
            if let Err(e) = task.handle.await {
                error!("Price cache refresh task failed: {}", e);
            }
            info!("Price cache stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
