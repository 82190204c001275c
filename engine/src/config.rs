use std::collections::HashMap;
use std::time::Duration;

/// Engine configuration. Loaded once at startup and immutable for the
/// lifetime of the engine; components receive it by reference.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Cadence of the processor loop. Clamped to [0.1, 10.0] seconds.
    pub processor_interval_seconds: f64,

    /// Quotes older than this are pruned each tick.
    pub quote_ttl_seconds: u64,

    /// Pattern-log entries older than this are pruned each tick.
    pub pattern_ttl_seconds: u64,

    /// Minimum price increment assumed when a ticker has no override.
    pub default_tick_size: f64,

    /// Per-ticker tick sizes for instruments that do not trade in cents.
    pub tick_size_overrides: HashMap<String, f64>,

    /// Displayed size above which a quote counts as a large order.
    pub large_size_threshold: u64,

    /// A ticker leaves the tracked set after this long without a quote.
    pub tracked_idle_evict_seconds: u64,

    /// Concurrent per-ticker derivations per tick.
    pub worker_permits: usize,

    /// Default per-query deadline when the caller does not carry one.
    pub query_deadline_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            processor_interval_seconds: 1.0,
            quote_ttl_seconds: 3600,
            pattern_ttl_seconds: 3600,
            default_tick_size: 0.01,
            tick_size_overrides: HashMap::new(),
            large_size_threshold: 10_000,
            tracked_idle_evict_seconds: 600,
            worker_permits: default_worker_permits(),
            query_deadline_ms: 2_000,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the environment on top of defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<f64>("PROCESSOR_INTERVAL_SECONDS") {
            cfg.processor_interval_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("QUOTE_TTL_SECONDS") {
            cfg.quote_ttl_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("PATTERN_TTL_SECONDS") {
            cfg.pattern_ttl_seconds = v;
        }
        if let Some(v) = env_parse::<f64>("TICK_SIZE") {
            cfg.default_tick_size = v;
        }
        if let Some(v) = env_parse::<u64>("LARGE_SIZE_THRESHOLD") {
            cfg.large_size_threshold = v;
        }
        if let Some(v) = env_parse::<u64>("TRACKED_IDLE_EVICT_SECONDS") {
            cfg.tracked_idle_evict_seconds = v;
        }
        if let Some(v) = env_parse::<u64>("QUERY_DEADLINE_MS") {
            cfg.query_deadline_ms = v;
        }
        cfg.normalized()
    }

    /// Clamp free-form inputs into their documented ranges.
    pub fn normalized(mut self) -> Self {
        self.processor_interval_seconds = self.processor_interval_seconds.clamp(0.1, 10.0);
        if self.worker_permits == 0 {
            self.worker_permits = 1;
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.processor_interval_seconds)
    }

    pub fn tick_size(&self, ticker: &str) -> f64 {
        self.tick_size_overrides
            .get(ticker)
            .copied()
            .unwrap_or(self.default_tick_size)
    }
}

fn default_worker_permits() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped() {
        let cfg = EngineConfig {
            processor_interval_seconds: 0.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(cfg.processor_interval_seconds, 0.1);

        let cfg = EngineConfig {
            processor_interval_seconds: 60.0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(cfg.processor_interval_seconds, 10.0);
    }

    #[test]
    fn tick_size_override_wins() {
        let mut cfg = EngineConfig::default();
        cfg.tick_size_overrides.insert("BRK".to_string(), 0.05);
        assert_eq!(cfg.tick_size("BRK"), 0.05);
        assert_eq!(cfg.tick_size("SPY"), 0.01);
    }
}
