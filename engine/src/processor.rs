//! Background processor loop.
//!
//! `run_tick` is a scheduled step function: the binary owns the cadence
//! and calls it with a captured `now_ms`. Within a tick, per-ticker work
//! fans out over a bounded worker pool and every failure stays isolated
//! to its ticker.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use analytics::behavior::analyze_behaviors;
use analytics::levels::{compute_levels, detect_level_sweeps};
use analytics::metrics::compute_window_metrics;
use analytics::patterns::detect_patterns;
use common::logger::warn_if_slow;
use corelib::models::{Quote, Side, Window};
use store::{QuoteStore, StoreError};

use crate::config::EngineConfig;

/// Identical patterns within this window collapse to one occurrence.
pub const PATTERN_DEDUP_WINDOW_MS: u64 = 30_000;

/// Behavior flags carry the same TTL as the window they derive from.
const BEHAVIOR_TTL_SECONDS: u64 = Window::OneMin.metrics_ttl_seconds();

const LEVEL_TTL_SECONDS: u64 = 3600;

/// Quotes handed to the behavior analyzer alongside the 60s metrics.
const BEHAVIOR_QUOTE_TAIL: usize = 20;

/// The fetch reaches one margin past the largest window so span gating
/// can see a tape that covers the full five minutes.
const RANGE_MARGIN_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct TickerStats {
    pub process_count: u64,
    pub error_count: u64,
    pub skipped_deadline: u64,
    pub patterns_detected: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorStatus {
    pub tracked: Vec<String>,
    pub stats: HashMap<String, TickerStats>,
}

pub struct ProcessorEngine<S: QuoteStore> {
    store: Arc<S>,
    cfg: Arc<EngineConfig>,
    /// Membership only; never held across I/O.
    tracked: Mutex<HashSet<String>>,
    stats: Mutex<HashMap<String, TickerStats>>,
    permits: Semaphore,
}

impl<S: QuoteStore> ProcessorEngine<S> {
    pub fn new(store: Arc<S>, cfg: Arc<EngineConfig>) -> Self {
        let permits = Semaphore::new(cfg.worker_permits.max(1));
        Self {
            store,
            cfg,
            tracked: Mutex::new(HashSet::new()),
            stats: Mutex::new(HashMap::new()),
            permits,
        }
    }

    pub fn status(&self) -> ProcessorStatus {
        let mut tracked: Vec<String> = self.tracked.lock().iter().cloned().collect();
        tracked.sort();
        ProcessorStatus {
            tracked,
            stats: self.stats.lock().clone(),
        }
    }

    /// One processor step. Refreshes the tracked set from the store, then
    /// derives metrics, behaviors, patterns and levels for every active
    /// ticker.
    pub async fn run_tick(&self, now_ms: u64) {
        let tickers = match self.store.tickers().await {
            Ok(t) => t,
            Err(e) => {
                // Retry happens naturally on the next tick.
                warn!(error = %e, "tick aborted: ticker discovery failed");
                return;
            }
        };

        let active = self.refresh_tracked(tickers, now_ms).await;
        if active.is_empty() {
            return;
        }

        let deadline = self.cfg.interval();
        join_all(
            active
                .iter()
                .map(|t| self.process_ticker_guarded(t, now_ms, deadline)),
        )
        .await;
    }

    /// Update tracked membership: a ticker enters on its first observed
    /// quote and leaves after the idle-evict window. Evicted tickers get
    /// a final prune so their tape does not outlive its TTL.
    async fn refresh_tracked(&self, tickers: Vec<String>, now_ms: u64) -> Vec<String> {
        let evict_ms = self.cfg.tracked_idle_evict_seconds * 1000;
        let mut active = Vec::new();
        let mut stale = Vec::new();

        for ticker in tickers {
            match self.store.latest(&ticker).await {
                Ok(Some(q)) if q.ts_ms.saturating_add(evict_ms) > now_ms => active.push(ticker),
                Ok(_) => stale.push(ticker),
                Err(e) => warn!(ticker = %ticker, error = %e, "latest-quote read failed"),
            }
        }

        {
            let mut tracked = self.tracked.lock();
            for t in &stale {
                if tracked.remove(t) {
                    info!(ticker = %t, "ticker evicted after idle window");
                }
            }
            for t in &active {
                if tracked.insert(t.clone()) {
                    info!(ticker = %t, "ticker entered tracked set");
                }
            }
        }

        for t in &stale {
            let _ = self.prune(t, now_ms).await;
        }

        active
    }

    async fn process_ticker_guarded(&self, ticker: &str, now_ms: u64, deadline: Duration) {
        let Ok(_permit) = self.permits.acquire().await else {
            return;
        };

        match tokio::time::timeout(deadline, self.process_ticker(ticker, now_ms)).await {
            Ok(Ok(patterns)) => {
                let mut stats = self.stats.lock();
                let entry = stats.entry(ticker.to_string()).or_default();
                entry.process_count += 1;
                entry.patterns_detected += patterns;
            }
            Ok(Err(e)) => {
                warn!(ticker = %ticker, error = %e, "derivation failed; ticker isolated");
                self.stats.lock().entry(ticker.to_string()).or_default().error_count += 1;
            }
            Err(_) => {
                warn!(ticker = %ticker, "derivation exceeded tick deadline; skipped");
                self.stats
                    .lock()
                    .entry(ticker.to_string())
                    .or_default()
                    .skipped_deadline += 1;
            }
        }
    }

    /// Derive every cached slot for one ticker. Returns the number of
    /// patterns appended this tick.
    async fn process_ticker(&self, ticker: &str, now_ms: u64) -> Result<u64, StoreError> {
        let from_ms = now_ms.saturating_sub(Window::FiveMin.ms() + RANGE_MARGIN_MS);
        let quotes = warn_if_slow(
            "quote_range",
            Duration::from_millis(250),
            self.store.range(ticker, from_ms, now_ms),
        )
        .await?;

        let mut patterns_appended = 0u64;
        if quotes.len() >= 2 {
            let span_ms = quotes[quotes.len() - 1].ts_ms - quotes[0].ts_ms;
            let tick_size = self.cfg.tick_size(ticker);
            let threshold = self.cfg.large_size_threshold;

            let tail_10s = tail_window(&quotes, now_ms, Window::TenSec);
            let metrics_10s = compute_window_metrics(tail_10s, Window::TenSec, threshold);
            self.store.put_metrics(ticker, metrics_10s, now_ms).await?;

            if span_ms >= Window::OneMin.ms() {
                let tail_60s = tail_window(&quotes, now_ms, Window::OneMin);
                let metrics_60s = compute_window_metrics(tail_60s, Window::OneMin, threshold);

                let behavior_tail =
                    &tail_60s[tail_60s.len().saturating_sub(BEHAVIOR_QUOTE_TAIL)..];
                let flags = analyze_behaviors(behavior_tail, &metrics_60s);

                for pattern in detect_patterns(tail_60s, &metrics_60s, tick_size, now_ms) {
                    self.store
                        .append_pattern(ticker, pattern, PATTERN_DEDUP_WINDOW_MS)
                        .await?;
                    patterns_appended += 1;
                }

                self.store.put_metrics(ticker, metrics_60s, now_ms).await?;
                self.store
                    .put_behaviors(ticker, flags, BEHAVIOR_TTL_SECONDS, now_ms)
                    .await?;
            }

            if span_ms >= Window::FiveMin.ms() {
                let tail_5min = tail_window(&quotes, now_ms, Window::FiveMin);
                let metrics_5min = compute_window_metrics(tail_5min, Window::FiveMin, threshold);
                self.store.put_metrics(ticker, metrics_5min, now_ms).await?;

                for side in Side::BOTH {
                    let previous = self.store.levels(ticker, side, now_ms).await?;
                    let current = compute_levels(tail_5min, side, tick_size);
                    for sweep in detect_level_sweeps(&previous, &current, side, now_ms) {
                        self.store
                            .append_pattern(ticker, sweep, PATTERN_DEDUP_WINDOW_MS)
                            .await?;
                        patterns_appended += 1;
                    }
                    self.store
                        .put_levels(ticker, side, current, LEVEL_TTL_SECONDS, now_ms)
                        .await?;
                }
            }

            debug!(
                ticker = %ticker,
                quotes = quotes.len(),
                span_ms,
                patterns_appended,
                "tick derivation complete"
            );
        }

        self.prune(ticker, now_ms).await?;
        Ok(patterns_appended)
    }

    async fn prune(&self, ticker: &str, now_ms: u64) -> Result<(), StoreError> {
        self.store
            .prune_quotes(ticker, now_ms.saturating_sub(self.cfg.quote_ttl_seconds * 1000))
            .await?;
        self.store
            .prune_patterns(
                ticker,
                now_ms.saturating_sub(self.cfg.pattern_ttl_seconds * 1000),
            )
            .await
    }
}

/// Quotes whose timestamps fall inside the trailing window.
fn tail_window(quotes: &[Quote], now_ms: u64, window: Window) -> &[Quote] {
    let from_ms = now_ms.saturating_sub(window.ms());
    let start = quotes.partition_point(|q| q.ts_ms < from_ms);
    &quotes[start..]
}
