//! Quote Store abstraction.
//!
//! The engine treats its backing store as an ordered-set keyed by
//! timestamp for quotes, a fast-path map for the latest quote, and
//! TTL-bearing slots for derived data. Concrete realizations may be the
//! in-memory store shipped here, a sorted-set-capable KV service, or an
//! RPC shim fronting one; the engine does not prescribe which.

pub mod memory;

pub use memory::MemoryQuoteStore;

use async_trait::async_trait;
use thiserror::Error;

use corelib::models::{BehaviorFlags, Pattern, PriceLevel, Quote, Side, Window, WindowMetrics};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("quote store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only, time-ordered per-ticker quote store with derived-data
/// slots.
///
/// Consistency contract: appends are single-writer per ticker (the
/// external publisher); derived slots are single-writer per (ticker, slot)
/// (the processor loop). Readers of a slot see either the previous full
/// record or the new full record, never a mix. I/O failure surfaces as
/// [`StoreError::Unavailable`]; the store itself never retries.
///
/// TTL-bearing operations take an explicit `now_ms` so expiry is
/// deterministic under test.
#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Insert by timestamp; an equal-timestamp entry is overwritten.
    async fn append(&self, quote: Quote) -> Result<(), StoreError>;

    /// Most recent full quote for the ticker, O(1).
    async fn latest(&self, ticker: &str) -> Result<Option<Quote>, StoreError>;

    /// Quotes with `from_ms <= ts_ms <= to_ms`, time-ascending.
    async fn range(&self, ticker: &str, from_ms: u64, to_ms: u64)
        -> Result<Vec<Quote>, StoreError>;

    /// Remove quotes with `ts_ms < older_than_ms`. Idempotent.
    async fn prune_quotes(&self, ticker: &str, older_than_ms: u64) -> Result<(), StoreError>;

    /// Tickers that currently hold any quotes.
    async fn tickers(&self) -> Result<Vec<String>, StoreError>;

    /// Overwrite the (ticker, window) metrics slot. TTL is 10x the window
    /// duration.
    async fn put_metrics(
        &self,
        ticker: &str,
        metrics: WindowMetrics,
        now_ms: u64,
    ) -> Result<(), StoreError>;

    async fn metrics(
        &self,
        ticker: &str,
        window: Window,
        now_ms: u64,
    ) -> Result<Option<WindowMetrics>, StoreError>;

    async fn put_behaviors(
        &self,
        ticker: &str,
        flags: BehaviorFlags,
        ttl_seconds: u64,
        now_ms: u64,
    ) -> Result<(), StoreError>;

    async fn behaviors(&self, ticker: &str, now_ms: u64)
        -> Result<Option<BehaviorFlags>, StoreError>;

    /// Overwrite the (ticker, side) level slot with an already-ranked
    /// table.
    async fn put_levels(
        &self,
        ticker: &str,
        side: Side,
        levels: Vec<PriceLevel>,
        ttl_seconds: u64,
        now_ms: u64,
    ) -> Result<(), StoreError>;

    async fn levels(
        &self,
        ticker: &str,
        side: Side,
        now_ms: u64,
    ) -> Result<Vec<PriceLevel>, StoreError>;

    /// Append to the per-ticker pattern log, collapsing duplicates: an
    /// existing pattern with the same suppression key within
    /// `dedup_window_ms` of the new timestamp is replaced (the later
    /// timestamp wins).
    async fn append_pattern(
        &self,
        ticker: &str,
        pattern: Pattern,
        dedup_window_ms: u64,
    ) -> Result<(), StoreError>;

    /// Patterns with `from_ms <= ts_ms <= to_ms`, time-ascending.
    async fn patterns_in(
        &self,
        ticker: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<Pattern>, StoreError>;

    /// Remove patterns with `ts_ms < older_than_ms`. Idempotent.
    async fn prune_patterns(&self, ticker: &str, older_than_ms: u64) -> Result<(), StoreError>;
}
