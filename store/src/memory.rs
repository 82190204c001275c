use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::Included;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use corelib::models::{BehaviorFlags, Pattern, PriceLevel, Quote, Side, Window, WindowMetrics};

use crate::{QuoteStore, StoreError};

/// Slot value with a lazy expiry deadline.
#[derive(Clone)]
struct Expiring<T> {
    value: T,
    expires_at_ms: u64,
}

impl<T: Clone> Expiring<T> {
    fn new(value: T, ttl_seconds: u64, now_ms: u64) -> Self {
        Self {
            value,
            expires_at_ms: now_ms.saturating_add(ttl_seconds * 1000),
        }
    }

    fn live(&self, now_ms: u64) -> Option<T> {
        (now_ms < self.expires_at_ms).then(|| self.value.clone())
    }
}

#[derive(Default)]
struct TickerState {
    /// Ordered by timestamp; equal-timestamp inserts overwrite.
    quotes: BTreeMap<u64, Quote>,
    /// Fast path for the most recent quote.
    latest: Option<Quote>,
    metrics: HashMap<Window, Expiring<WindowMetrics>>,
    behaviors: Option<Expiring<BehaviorFlags>>,
    levels: HashMap<Side, Expiring<Vec<PriceLevel>>>,
    /// Time-ascending pattern log.
    patterns: Vec<Pattern>,
}

/// In-memory realization of [`QuoteStore`].
///
/// Locking: one `parking_lot` RwLock over the ticker map, never held
/// across an await. Writes replace whole records, so a concurrent reader
/// observes either the previous or the new value of a slot.
#[derive(Default)]
pub struct MemoryQuoteStore {
    inner: RwLock<HashMap<String, TickerState>>,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    async fn append(&self, quote: Quote) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        let state = map.entry(quote.ticker.clone()).or_default();

        let is_newest = state
            .latest
            .as_ref()
            .map_or(true, |l| quote.ts_ms >= l.ts_ms);
        if is_newest {
            state.latest = Some(quote.clone());
        }
        state.quotes.insert(quote.ts_ms, quote);
        Ok(())
    }

    async fn latest(&self, ticker: &str) -> Result<Option<Quote>, StoreError> {
        Ok(self.inner.read().get(ticker).and_then(|s| s.latest.clone()))
    }

    async fn range(
        &self,
        ticker: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<Quote>, StoreError> {
        let map = self.inner.read();
        let Some(state) = map.get(ticker) else {
            return Ok(Vec::new());
        };
        Ok(state
            .quotes
            .range((Included(from_ms), Included(to_ms)))
            .map(|(_, q)| q.clone())
            .collect())
    }

    async fn prune_quotes(&self, ticker: &str, older_than_ms: u64) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        if let Some(state) = map.get_mut(ticker) {
            let keep = state.quotes.split_off(&older_than_ms);
            let removed = state.quotes.len();
            state.quotes = keep;
            if removed > 0 {
                debug!(ticker, removed, "pruned expired quotes");
            }
        }
        Ok(())
    }

    async fn tickers(&self) -> Result<Vec<String>, StoreError> {
        let map = self.inner.read();
        let mut out: Vec<String> = map
            .iter()
            .filter(|(_, s)| !s.quotes.is_empty())
            .map(|(t, _)| t.clone())
            .collect();
        out.sort();
        Ok(out)
    }

    async fn put_metrics(
        &self,
        ticker: &str,
        metrics: WindowMetrics,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let ttl = metrics.window.metrics_ttl_seconds();
        let mut map = self.inner.write();
        let state = map.entry(ticker.to_string()).or_default();
        state
            .metrics
            .insert(metrics.window, Expiring::new(metrics, ttl, now_ms));
        Ok(())
    }

    async fn metrics(
        &self,
        ticker: &str,
        window: Window,
        now_ms: u64,
    ) -> Result<Option<WindowMetrics>, StoreError> {
        Ok(self
            .inner
            .read()
            .get(ticker)
            .and_then(|s| s.metrics.get(&window))
            .and_then(|e| e.live(now_ms)))
    }

    async fn put_behaviors(
        &self,
        ticker: &str,
        flags: BehaviorFlags,
        ttl_seconds: u64,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        let state = map.entry(ticker.to_string()).or_default();
        state.behaviors = Some(Expiring::new(flags, ttl_seconds, now_ms));
        Ok(())
    }

    async fn behaviors(
        &self,
        ticker: &str,
        now_ms: u64,
    ) -> Result<Option<BehaviorFlags>, StoreError> {
        Ok(self
            .inner
            .read()
            .get(ticker)
            .and_then(|s| s.behaviors.as_ref())
            .and_then(|e| e.live(now_ms)))
    }

    async fn put_levels(
        &self,
        ticker: &str,
        side: Side,
        levels: Vec<PriceLevel>,
        ttl_seconds: u64,
        now_ms: u64,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        let state = map.entry(ticker.to_string()).or_default();
        state
            .levels
            .insert(side, Expiring::new(levels, ttl_seconds, now_ms));
        Ok(())
    }

    async fn levels(
        &self,
        ticker: &str,
        side: Side,
        now_ms: u64,
    ) -> Result<Vec<PriceLevel>, StoreError> {
        Ok(self
            .inner
            .read()
            .get(ticker)
            .and_then(|s| s.levels.get(&side))
            .and_then(|e| e.live(now_ms))
            .unwrap_or_default())
    }

    async fn append_pattern(
        &self,
        ticker: &str,
        pattern: Pattern,
        dedup_window_ms: u64,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        let state = map.entry(ticker.to_string()).or_default();

        let key = pattern.suppression_key();
        let cutoff = pattern.ts_ms.saturating_sub(dedup_window_ms);
        state
            .patterns
            .retain(|p| p.ts_ms < cutoff || p.suppression_key() != key);

        let idx = state.patterns.partition_point(|p| p.ts_ms <= pattern.ts_ms);
        state.patterns.insert(idx, pattern);
        Ok(())
    }

    async fn patterns_in(
        &self,
        ticker: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<Pattern>, StoreError> {
        let map = self.inner.read();
        let Some(state) = map.get(ticker) else {
            return Ok(Vec::new());
        };
        Ok(state
            .patterns
            .iter()
            .filter(|p| p.ts_ms >= from_ms && p.ts_ms <= to_ms)
            .cloned()
            .collect())
    }

    async fn prune_patterns(&self, ticker: &str, older_than_ms: u64) -> Result<(), StoreError> {
        let mut map = self.inner.write();
        if let Some(state) = map.get_mut(ticker) {
            state.patterns.retain(|p| p.ts_ms >= older_than_ms);
        }
        Ok(())
    }
}
