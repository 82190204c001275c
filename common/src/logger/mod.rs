pub mod init;
pub mod trace_id;

pub use init::init_tracing;
pub use trace_id::TraceId;

use std::time::Duration;

/// Awaits `fut` and emits a warning if it took longer than `max`.
///
/// Used around store reads and per-ticker derivations so slow backends
/// show up in logs without failing the tick.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
