
use std::sync::Arc;
use std::time::Duration;

use corelib::models::{round_price, Quote, Side, Window};
use engine::{AnalyzeRequest, EngineConfig, OrderFlowEngine};
use mock_store::{FailingStore, SlowStore};
use store::{MemoryQuoteStore, QuoteStore};

const NOW: u64 = 1_700_000_000_000;

fn quote(ticker: &str, ts_ms: u64, bid: f64, ask: f64, bid_size: u64, ask_size: u64) -> Quote {
    Quote {
        ticker: ticker.to_string(),
        ts_ms,
        bid_price: round_price(bid),
        ask_price: round_price(ask),
        bid_size,
        ask_size,
    }
}

fn engine_with_memory_store() -> (Arc<MemoryQuoteStore>, OrderFlowEngine<MemoryQuoteStore>) {
    let store = Arc::new(MemoryQuoteStore::new());
    let engine = OrderFlowEngine::new(Arc::clone(&store), EngineConfig::default());
    (store, engine)
}

/// 66 quotes across 65s: flat bid, then ten cent-lifts inside the last
/// minute, displayed bid growing 5000 -> 8000, ask pinned.
async fn seed_rising_bid(store: &MemoryQuoteStore) {
    let start = NOW - 65_000;
    for i in 0..=65u64 {
        let lifts = i.saturating_sub(10).min(10) as f64;
        store
            .append(quote(
                "SPY",
                start + i * 1000,
                450.10 + 0.01 * lifts,
                450.30,
                5_000 + i * 46,
                2_000,
            ))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn rising_bid_steady_ask_scenario() {
    let (store, engine) = engine_with_memory_store();
    seed_rising_bid(&store).await;

    engine.run_tick(NOW).await;
    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("SPY").with_history("60s"), NOW)
        .await;

    assert!(doc.contains("<bid_lifts>10</bid_lifts>"), "{doc}");
    assert!(doc.contains("<bid_drops>0</bid_drops>"), "{doc}");
    assert!(doc.contains("<bid>INCREASING</bid>"), "{doc}");
    assert!(doc.contains("<momentum_building>YES</momentum_building>"), "{doc}");
    assert!(doc.contains("<bid_stacking>YES</bid_stacking>"), "{doc}");
    assert!(doc.contains("<type>momentum_shift</type>"), "{doc}");
    assert!(doc.contains("<direction>bullish</direction>"), "{doc}");
    assert!(doc.contains("<strength>strong</strength>"), "{doc}");
}

#[tokio::test]
async fn no_data_scenario() {
    let (_store, engine) = engine_with_memory_store();

    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("ZZZZ").with_history("5mins"), NOW)
        .await;

    assert!(doc.contains(r#"error="true""#));
    assert!(doc.contains("No recent quote data available"));
    assert_eq!(doc.matches("<suggestion>").count(), 3);
    assert_eq!(doc.matches("<cause>").count(), 3);
}

#[tokio::test]
async fn invalid_history_scenario() {
    let (store, engine) = engine_with_memory_store();
    store
        .append(quote("SPY", NOW - 1000, 450.0, 450.05, 1000, 1000))
        .await
        .unwrap();

    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("SPY").with_history("3fortnights"), NOW)
        .await;

    assert!(doc.contains(r#"error="true""#));
    assert!(doc.contains("Invalid history window"));
}

#[tokio::test]
async fn invalid_ticker_scenario() {
    let (_store, engine) = engine_with_memory_store();

    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("SP Y!"), NOW)
        .await;

    assert!(doc.contains(r#"error="true""#));
    assert!(doc.contains("Invalid ticker symbol"));
}

#[tokio::test]
async fn store_unavailable_scenario() {
    let engine = OrderFlowEngine::new(Arc::new(FailingStore), EngineConfig::default());

    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("SPY"), NOW)
        .await;

    assert!(doc.contains(r#"error="true""#));
    assert!(doc.contains("Quote store unavailable"));
}

#[tokio::test(start_paused = true)]
async fn query_deadline_produces_timeout_snapshot() {
    let store = Arc::new(SlowStore::new(Duration::from_secs(30)));
    store
        .append(quote("SPY", NOW - 1000, 450.0, 450.05, 1000, 1000))
        .await
        .unwrap();
    let engine = OrderFlowEngine::new(store, EngineConfig::default());

    let mut req = AnalyzeRequest::new("SPY");
    req.deadline_ms = Some(100);
    let doc = engine.analyze_order_flow(&req, NOW).await;

    assert!(doc.contains(r#"error="true""#));
    assert!(doc.contains("Query deadline exceeded"));
}

#[tokio::test]
async fn consecutive_renders_are_byte_identical_on_a_frozen_store() {
    let (store, engine) = engine_with_memory_store();
    seed_rising_bid(&store).await;
    engine.run_tick(NOW).await;

    let req = AnalyzeRequest::new("SPY").with_history("60s");
    let first = engine.analyze_order_flow(&req, NOW).await;
    let second = engine.analyze_order_flow(&req, NOW).await;
    assert_eq!(first, second);

    // A sub-second later call lands in the same ISO second, so even the
    // timestamp attribute agrees.
    let third = engine.analyze_order_flow(&req, NOW + 400).await;
    assert_eq!(first, third);
}

#[tokio::test]
async fn reprocessing_a_frozen_store_is_idempotent() {
    let (store, engine) = engine_with_memory_store();
    seed_rising_bid(&store).await;

    engine.run_tick(NOW).await;
    let req = AnalyzeRequest::new("SPY").with_history("60s");
    let first = engine.analyze_order_flow(&req, NOW).await;

    engine.run_tick(NOW).await;
    let second = engine.analyze_order_flow(&req, NOW).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn include_patterns_false_elides_the_pattern_tree() {
    let (store, engine) = engine_with_memory_store();
    seed_rising_bid(&store).await;
    engine.run_tick(NOW).await;

    let mut req = AnalyzeRequest::new("SPY").with_history("60s");
    req.include_patterns = false;
    let doc = engine.analyze_order_flow(&req, NOW).await;

    assert!(!doc.contains("<detected_patterns"));
    // The pattern count still appears in the data summary.
    assert!(doc.contains("<pattern_count>"));
}

#[tokio::test]
async fn short_history_renders_only_the_ten_second_window() {
    let (store, engine) = engine_with_memory_store();
    seed_rising_bid(&store).await;
    engine.run_tick(NOW).await;

    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("SPY").with_history("30s"), NOW)
        .await;

    assert!(doc.contains("<last_10s>"));
    assert!(!doc.contains("<last_60s>"));
    assert!(!doc.contains("<last_5min>"));
    assert!(doc.contains(r#"history_window="30s""#));
}

/// A resting bid level that leaves the five-minute window between two
/// processor ticks is reported as a sweep.
#[tokio::test]
async fn vanished_level_is_reported_as_a_sweep() {
    let (store, engine) = engine_with_memory_store();
    let t0 = NOW - 620_000;

    // Five minutes of heavy bid at 450.00.
    for i in 0..=310u64 {
        store
            .append(quote("SPY", t0 + i * 1000, 450.00, 450.05, 20_000, 4_000))
            .await
            .unwrap();
    }
    let first_tick = t0 + 310_000;
    engine.run_tick(first_tick).await;

    let levels = store.levels("SPY", Side::Bid, first_tick).await.unwrap();
    assert!(!levels.is_empty());
    assert_eq!(levels[0].price, 450.00);

    // Five more minutes trading away from the level.
    for i in 311..=620u64 {
        store
            .append(quote("SPY", t0 + i * 1000, 449.00, 449.05, 6_000, 4_000))
            .await
            .unwrap();
    }
    engine.run_tick(NOW).await;

    let doc = engine
        .analyze_order_flow(&AnalyzeRequest::new("SPY").with_history("5mins"), NOW)
        .await;

    assert!(doc.contains(r#"<sweep price="450.0000""#), "{doc}");
    assert!(doc.contains("<type>sweep</type>"), "{doc}");
}

#[tokio::test]
async fn pattern_log_honors_the_suppression_window() {
    let (store, engine) = engine_with_memory_store();
    seed_rising_bid(&store).await;

    // Three ticks inside one suppression window re-emit the same
    // patterns; the log keeps one occurrence per key.
    engine.run_tick(NOW - 2_000).await;
    engine.run_tick(NOW - 1_000).await;
    engine.run_tick(NOW).await;

    let patterns = store.patterns_in("SPY", 0, NOW).await.unwrap();
    let mut keys: Vec<_> = patterns.iter().map(|p| p.suppression_key()).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), patterns.len(), "duplicate suppression failed");

    // Later timestamp wins.
    assert!(patterns.iter().all(|p| p.ts_ms == NOW));
}

#[tokio::test]
async fn processor_skips_thin_tapes_but_tracks_the_ticker() {
    let (store, engine) = engine_with_memory_store();
    store
        .append(quote("IWM", NOW - 500, 210.0, 210.02, 900, 900))
        .await
        .unwrap();

    engine.run_tick(NOW).await;

    assert!(engine.status().tracked.contains(&"IWM".to_string()));
    assert!(store
        .metrics("IWM", Window::TenSec, NOW)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn idle_ticker_leaves_the_tracked_set() {
    let (store, engine) = engine_with_memory_store();
    store
        .append(quote("SPY", NOW - 700_000, 450.0, 450.05, 1000, 1000))
        .await
        .unwrap();
    store
        .append(quote("QQQ", NOW - 1_000, 380.0, 380.02, 1000, 1000))
        .await
        .unwrap();

    engine.run_tick(NOW).await;

    let tracked = engine.status().tracked;
    assert!(tracked.contains(&"QQQ".to_string()));
    assert!(!tracked.contains(&"SPY".to_string()));
}
