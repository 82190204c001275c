//! Seed the engine with a synthetic tape and print snapshots.
//!
//! Development aid: exercises the full ingest -> process -> query path
//! without a live publisher. Pass `--quotes file.jsonl` to replay a
//! recorded tape (one JSON quote per line) instead of the built-in one.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use common::logger::init_tracing;
use common::time::now_ms;
use corelib::models::{round_price, Quote};
use engine::{AnalyzeRequest, EngineConfig, OrderFlowEngine};
use store::{MemoryQuoteStore, QuoteStore};

#[derive(Parser, Debug)]
#[command(name = "orderflow-demo", about = "Order-flow engine demo harness")]
struct Cli {
    /// JSON-lines file of quotes to seed instead of the built-in tape.
    #[arg(long)]
    quotes: Option<PathBuf>,

    /// Emit JSON logs instead of pretty logs.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("orderflow-demo", cli.json_logs);

    let store = Arc::new(MemoryQuoteStore::new());
    let engine = OrderFlowEngine::new(Arc::clone(&store), EngineConfig::from_env());

    let now = now_ms();
    match &cli.quotes {
        Some(path) => seed_from_file(store.as_ref(), path).await?,
        None => seed_builtin(store.as_ref(), now).await?,
    }

    // Two ticks on the same clock also demonstrate that reprocessing an
    // unchanged tape leaves the derived slots untouched.
    engine.run_tick(now).await;
    engine.run_tick(now).await;

    let cases = [
        ("SPY", Some("5mins"), true),
        ("QQQ", Some("1min"), true),
        ("SPY", Some("30s"), false),
        ("SPY", Some("3fortnights"), true),
        ("ZZZZ", Some("5mins"), true),
    ];

    for (ticker, history, include_patterns) in cases {
        println!(
            "--- analyze_order_flow({ticker}, {}, patterns={include_patterns}) ---",
            history.unwrap_or("default")
        );
        let mut req = AnalyzeRequest::new(ticker);
        req.history = history.map(String::from);
        req.include_patterns = include_patterns;
        println!("{}\n", engine.analyze_order_flow(&req, now_ms()).await);
    }

    let status = engine.status();
    tracing::info!(tracked = ?status.tracked, "demo complete");
    Ok(())
}

/// Built-in tape: six minutes of SPY with a bid ramp, and a QQQ book
/// pinned under heavy size that ends in a sweep-sized pull.
async fn seed_builtin(store: &MemoryQuoteStore, now: u64) -> anyhow::Result<()> {
    let start = now - 360_000;
    for i in 0..=360u64 {
        // Ten cent-lifts spread across the last minute of tape.
        let lifts = i.saturating_sub(300).min(10) as f64;
        store
            .append(Quote {
                ticker: "SPY".to_string(),
                ts_ms: start + i * 1000,
                bid_price: round_price(450.10 + 0.01 * lifts),
                ask_price: 450.30,
                bid_size: 5_000 + i * 10,
                ask_size: 2_000,
            })
            .await?;
    }

    for i in 0..=360u64 {
        let swept = i == 360;
        store
            .append(Quote {
                ticker: "QQQ".to_string(),
                ts_ms: start + i * 1000,
                bid_price: 380.00,
                ask_price: round_price(380.05 - 0.0001 * i as f64),
                bid_size: if swept { 1_500 } else { 19_000 + (i % 3) * 1_500 },
                ask_size: 4_000,
            })
            .await?;
    }

    tracing::info!("seeded built-in SPY/QQQ tape");
    Ok(())
}

async fn seed_from_file(store: &MemoryQuoteStore, path: &PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let mut count = 0usize;
    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        let quote: Quote = serde_json::from_str(line)?;
        store.append(quote).await?;
        count += 1;
    }
    tracing::info!(count, path = %path.display(), "seeded quotes from file");
    Ok(())
}
