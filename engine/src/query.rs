//! Query coordinator and the engine facade.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn, Instrument};

use common::logger::TraceId;
use corelib::models::{Side, Window};
use store::{QuoteStore, StoreError};

use crate::config::EngineConfig;
use crate::processor::{ProcessorEngine, ProcessorStatus};
use crate::snapshot::{error_snapshot, render_snapshot, SnapshotData};

pub const DEFAULT_HISTORY_SECONDS: u64 = 300;
pub const MIN_HISTORY_SECONDS: u64 = 5;
pub const MAX_HISTORY_SECONDS: u64 = 3600;

/// The one operation the RPC surface exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub ticker: String,
    /// e.g. "30s", "5mins", "1h". `None` analyzes the default 5 minutes.
    #[serde(default)]
    pub history: Option<String>,
    #[serde(default = "default_include_patterns")]
    pub include_patterns: bool,
    /// Deadline carried from the caller; engine default applies when
    /// absent.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_include_patterns() -> bool {
    true
}

impl AnalyzeRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            history: None,
            include_patterns: true,
            deadline_ms: None,
        }
    }

    pub fn with_history(mut self, history: impl Into<String>) -> Self {
        self.history = Some(history.into());
        self
    }
}

/// Query-side failures, each rendered as an error snapshot rather than a
/// transport error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("No recent quote data available")]
    NoData,
    #[error("Invalid ticker symbol")]
    InvalidTicker,
    #[error("Invalid history window")]
    InvalidHistory,
    #[error("Quote store unavailable")]
    StoreUnavailable,
    #[error("Query deadline exceeded")]
    Timeout,
    #[error("Unexpected internal error (code: {0})")]
    Internal(&'static str),
}

impl From<StoreError> for QueryError {
    fn from(_: StoreError) -> Self {
        QueryError::StoreUnavailable
    }
}

/// The engine value constructed once at startup and threaded through the
/// binary; owns the processor and serves queries. No process-wide state.
pub struct OrderFlowEngine<S: QuoteStore> {
    store: Arc<S>,
    cfg: Arc<EngineConfig>,
    processor: ProcessorEngine<S>,
}

impl<S: QuoteStore> OrderFlowEngine<S> {
    pub fn new(store: Arc<S>, cfg: EngineConfig) -> Self {
        let cfg = Arc::new(cfg.normalized());
        let processor = ProcessorEngine::new(Arc::clone(&store), Arc::clone(&cfg));
        Self {
            store,
            cfg,
            processor,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// One processor step; the cadence loop in the binary calls this.
    pub async fn run_tick(&self, now_ms: u64) {
        self.processor.run_tick(now_ms).await;
    }

    pub fn status(&self) -> ProcessorStatus {
        self.processor.status()
    }

    /// Serve `analyze_order_flow`. Always returns a document; all known
    /// failures are encoded as error snapshots.
    pub async fn analyze_order_flow(&self, req: &AnalyzeRequest, now_ms: u64) -> String {
        let raw_ticker = req.ticker.trim().to_string();
        let ticker = match normalize_ticker(&req.ticker) {
            Ok(t) => t,
            Err(e) => {
                warn!(ticker = %raw_ticker, "rejected ticker");
                return error_snapshot(&raw_ticker, &e, now_ms);
            }
        };
        let history_seconds = match parse_history(req.history.as_deref()) {
            Ok(h) => h,
            Err(e) => {
                warn!(ticker = %ticker, history = ?req.history, "rejected history");
                return error_snapshot(&ticker, &e, now_ms);
            }
        };

        let trace_id = TraceId::default();
        let span = tracing::info_span!(
            "analyze_order_flow",
            ticker = %ticker,
            history_seconds,
            trace_id = %trace_id,
        );

        let deadline = Duration::from_millis(req.deadline_ms.unwrap_or(self.cfg.query_deadline_ms));
        let work = self.build_snapshot(&ticker, history_seconds, req.include_patterns, now_ms);

        match tokio::time::timeout(deadline, work.instrument(span)).await {
            Ok(Ok(doc)) => {
                info!(ticker = %ticker, history_seconds, "snapshot served");
                doc
            }
            Ok(Err(e)) => error_snapshot(&ticker, &e, now_ms),
            Err(_) => {
                warn!(ticker = %ticker, "query deadline exceeded; abandoning reads");
                error_snapshot(&ticker, &QueryError::Timeout, now_ms)
            }
        }
    }

    async fn build_snapshot(
        &self,
        ticker: &str,
        history_seconds: u64,
        include_patterns: bool,
        now_ms: u64,
    ) -> Result<String, QueryError> {
        let latest = self.store.latest(ticker).await?.ok_or(QueryError::NoData)?;

        let from_ms = now_ms.saturating_sub(history_seconds * 1000);
        let quotes = self.store.range(ticker, from_ms, now_ms).await?;
        if quotes.is_empty() {
            return Err(QueryError::NoData);
        }

        let metrics_10s = self.store.metrics(ticker, Window::TenSec, now_ms).await?;
        let metrics_60s = if history_seconds >= Window::OneMin.seconds() {
            self.store.metrics(ticker, Window::OneMin, now_ms).await?
        } else {
            None
        };
        let metrics_5min = if history_seconds >= Window::FiveMin.seconds() {
            self.store.metrics(ticker, Window::FiveMin, now_ms).await?
        } else {
            None
        };

        let behaviors = self.store.behaviors(ticker, now_ms).await?;
        let bid_levels = self.store.levels(ticker, Side::Bid, now_ms).await?;
        let ask_levels = self.store.levels(ticker, Side::Ask, now_ms).await?;
        let patterns = self.store.patterns_in(ticker, from_ms, now_ms).await?;

        let data = SnapshotData {
            ticker: ticker.to_string(),
            now_ms,
            history_seconds,
            include_patterns,
            latest,
            quote_count: quotes.len(),
            metrics_10s,
            metrics_60s,
            metrics_5min,
            behaviors,
            bid_levels,
            ask_levels,
            patterns,
        };

        // A panic in the render path surfaces as a stable code, never a trace.
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| render_snapshot(&data)))
            .map_err(|_| QueryError::Internal("SNAPSHOT_RENDER"))
    }
}

/// Uppercase, 1-10 alphanumeric characters.
pub fn normalize_ticker(raw: &str) -> Result<String, QueryError> {
    let ticker = raw.trim().to_ascii_uppercase();
    let valid = (1..=10).contains(&ticker.len())
        && ticker.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(ticker)
    } else {
        Err(QueryError::InvalidTicker)
    }
}

/// Positive integer followed by a unit, clamped to [5s, 1h]. `None` or
/// an empty token means the default 5 minutes.
pub fn parse_history(raw: Option<&str>) -> Result<u64, QueryError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_HISTORY_SECONDS);
    };
    let token = raw.to_ascii_lowercase().replace(' ', "");
    if token.is_empty() {
        return Ok(DEFAULT_HISTORY_SECONDS);
    }

    let split = token
        .find(|c: char| !c.is_ascii_digit())
        .ok_or(QueryError::InvalidHistory)?;
    let (digits, unit) = token.split_at(split);
    let value: u64 = digits.parse().map_err(|_| QueryError::InvalidHistory)?;
    if value == 0 {
        return Err(QueryError::InvalidHistory);
    }

    let multiplier = match unit {
        "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hr" | "hrs" => 3600,
        _ => return Err(QueryError::InvalidHistory),
    };

    Ok((value * multiplier).clamp(MIN_HISTORY_SECONDS, MAX_HISTORY_SECONDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_units_parse() {
        assert_eq!(parse_history(Some("30s")).unwrap(), 30);
        assert_eq!(parse_history(Some("90sec")).unwrap(), 90);
        assert_eq!(parse_history(Some("120secs")).unwrap(), 120);
        assert_eq!(parse_history(Some("5m")).unwrap(), 300);
        assert_eq!(parse_history(Some("1min")).unwrap(), 60);
        assert_eq!(parse_history(Some("5mins")).unwrap(), 300);
        assert_eq!(parse_history(Some("1h")).unwrap(), 3600);
        assert_eq!(parse_history(Some("1hr")).unwrap(), 3600);
        assert_eq!(parse_history(Some(" 10 MINS ")).unwrap(), 600);
    }

    #[test]
    fn history_defaults_and_clamps() {
        assert_eq!(parse_history(None).unwrap(), 300);
        assert_eq!(parse_history(Some("")).unwrap(), 300);
        assert_eq!(parse_history(Some("1s")).unwrap(), 5);
        assert_eq!(parse_history(Some("9h")).unwrap(), 3600);
    }

    #[test]
    fn history_rejects_garbage() {
        for bad in ["3fortnights", "abc", "-5m", "0s", "5", "m", "5 m x"] {
            assert_eq!(
                parse_history(Some(bad)).unwrap_err(),
                QueryError::InvalidHistory,
                "{bad}"
            );
        }
    }

    #[test]
    fn ticker_normalization() {
        assert_eq!(normalize_ticker(" spy ").unwrap(), "SPY");
        assert_eq!(normalize_ticker("brk4").unwrap(), "BRK4");
        assert!(normalize_ticker("").is_err());
        assert!(normalize_ticker("TOOLONGTICKER").is_err());
        assert!(normalize_ticker("SP Y").is_err());
        assert!(normalize_ticker("SPY!").is_err());
    }
}
