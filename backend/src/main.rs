//! Order-flow engine service.
//!
//! Wires the in-memory quote store, the analysis engine and the
//! processor cadence loop, then waits for shutdown. Quote ingestion and
//! the RPC transport are external collaborators that embed the engine:
//! the publisher appends into the shared [`store::QuoteStore`] and the
//! tool surface calls [`engine::OrderFlowEngine::analyze_order_flow`].

use std::sync::Arc;

use clap::Parser;

use common::logger::init_tracing;
use common::time::now_ms;
use engine::{EngineConfig, OrderFlowEngine};
use store::MemoryQuoteStore;

#[derive(Parser, Debug)]
#[command(name = "orderflow-backend", about = "Order-flow microstructure analysis service")]
struct Cli {
    /// Processor cadence in seconds; overrides PROCESSOR_INTERVAL_SECONDS.
    #[arg(long)]
    interval_seconds: Option<f64>,

    /// Emit JSON logs instead of pretty logs.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing("orderflow-backend", cli.json_logs);

    tracing::info!("Starting order-flow backend...");

    let mut cfg = EngineConfig::from_env();
    if let Some(interval) = cli.interval_seconds {
        cfg.processor_interval_seconds = interval;
    }

    let store = Arc::new(MemoryQuoteStore::new());
    let engine = Arc::new(OrderFlowEngine::new(store, cfg));

    start_processor_loop(Arc::clone(&engine));

    tracing::info!(
        interval_seconds = engine.config().processor_interval_seconds,
        "Backend started; waiting for shutdown signal"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    Ok(())
}

/// Fixed-cadence loop that drives the processor step function. The tick
/// captures `now_ms` once so every derivation in the tick shares one
/// clock reading.
fn start_processor_loop(engine: Arc<OrderFlowEngine<MemoryQuoteStore>>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(engine.config().interval());
        loop {
            ticker.tick().await;
            engine.run_tick(now_ms()).await;
        }
    });
}
