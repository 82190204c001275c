//! Snapshot formatter.
//!
//! Assembles the current quote, cached metrics, behaviors, levels and
//! patterns into one `order_flow_data` document. Everything derives from
//! the `now_ms` captured at query entry, so a frozen store renders
//! byte-identical documents apart from the root timestamp attribute.
//!
//! Numeric rendering contract: prices 4 decimals, sizes integers, ratios
//! 2 decimals, `price_velocity` 6 decimals, durations integer seconds.

use corelib::models::{
    BehaviorFlags, Pattern, PatternKind, PriceLevel, Quote, Window, WindowMetrics,
};

use crate::query::QueryError;
use crate::xml::XmlElement;

/// Patterns rendered in the `detected_patterns` element; older ones stay
/// in the log but are elided from the document.
const MAX_RENDERED_PATTERNS: usize = 10;

pub struct SnapshotData {
    pub ticker: String,
    pub now_ms: u64,
    pub history_seconds: u64,
    pub include_patterns: bool,
    pub latest: Quote,
    /// Quotes inside the history window.
    pub quote_count: usize,
    pub metrics_10s: Option<WindowMetrics>,
    pub metrics_60s: Option<WindowMetrics>,
    pub metrics_5min: Option<WindowMetrics>,
    pub behaviors: Option<BehaviorFlags>,
    pub bid_levels: Vec<PriceLevel>,
    pub ask_levels: Vec<PriceLevel>,
    /// Patterns inside the history window, time-ascending, sweeps included.
    pub patterns: Vec<Pattern>,
}

pub fn render_snapshot(data: &SnapshotData) -> String {
    let mid = data.latest.mid();

    let mut root = XmlElement::new("order_flow_data")
        .attr("ticker", data.ticker.clone())
        .attr("timestamp", iso_timestamp(data.now_ms))
        .attr("current_price", fmt_price(mid))
        .attr("history_window", format!("{}s", data.history_seconds));

    root = root
        .child(data_summary(data))
        .child(current_quote(&data.latest, mid))
        .child(momentum(data))
        .child(size_metrics(data))
        .child(behaviors(data.behaviors.unwrap_or_default()))
        .child(price_levels(data, mid))
        .child(velocity(data))
        .maybe_child(detected_patterns(data));

    root.render()
}

/// Error snapshot: always a full document with the error
/// flag, a message, three causes and three suggestions.
pub fn error_snapshot(ticker: &str, error: &QueryError, now_ms: u64) -> String {
    let (causes, suggestions) = error_hints(error);

    let mut causes_el = XmlElement::new("possible_causes");
    for c in causes {
        causes_el = causes_el.child(XmlElement::new("cause").text(c));
    }
    let mut suggestions_el = XmlElement::new("suggestions");
    for s in suggestions {
        suggestions_el = suggestions_el.child(XmlElement::new("suggestion").text(s));
    }

    XmlElement::new("order_flow_data")
        .attr("ticker", ticker)
        .attr("timestamp", iso_timestamp(now_ms))
        .attr("error", "true")
        .child(XmlElement::new("error_message").text(error.to_string()))
        .child(causes_el)
        .child(suggestions_el)
        .render()
}

fn data_summary(data: &SnapshotData) -> XmlElement {
    XmlElement::new("data_summary")
        .child(XmlElement::new("quote_count").text(data.quote_count.to_string()))
        .child(XmlElement::new("window_seconds").text(data.history_seconds.to_string()))
        .child(XmlElement::new("pattern_count").text(data.patterns.len().to_string()))
}

fn current_quote(latest: &Quote, mid: f64) -> XmlElement {
    let ratio = latest.bid_size as f64 / latest.ask_size.max(1) as f64;
    let spread = latest.spread();
    let spread_bps = if mid > 0.0 { spread / mid * 10_000.0 } else { 0.0 };

    XmlElement::new("current_quote")
        .child(
            XmlElement::new("bid")
                .attr("price", fmt_price(latest.bid_price))
                .attr("size", latest.bid_size.to_string()),
        )
        .child(
            XmlElement::new("ask")
                .attr("price", fmt_price(latest.ask_price))
                .attr("size", latest.ask_size.to_string()),
        )
        .child(XmlElement::new("bid_ask_ratio").text(fmt_ratio(ratio)))
        .child(
            XmlElement::new("spread")
                .attr("value", fmt_price(spread))
                .attr("basis_points", fmt_ratio(spread_bps)),
        )
}

fn momentum(data: &SnapshotData) -> XmlElement {
    let mut momentum = XmlElement::new("momentum").child(window_momentum(
        "last_10s",
        &metrics_or_empty(&data.metrics_10s, Window::TenSec),
        false,
    ));
    if data.history_seconds >= Window::OneMin.seconds() {
        momentum = momentum.child(window_momentum(
            "last_60s",
            &metrics_or_empty(&data.metrics_60s, Window::OneMin),
            true,
        ));
    }
    if data.history_seconds >= Window::FiveMin.seconds() {
        momentum = momentum.child(window_momentum(
            "last_5min",
            &metrics_or_empty(&data.metrics_5min, Window::FiveMin),
            true,
        ));
    }
    momentum
}

fn window_momentum(name: &str, m: &WindowMetrics, with_transitions: bool) -> XmlElement {
    let mut el = XmlElement::new(name)
        .child(XmlElement::new("bid_price_change").text(fmt_price(m.bid_price_change)))
        .child(XmlElement::new("ask_price_change").text(fmt_price(m.ask_price_change)))
        .child(XmlElement::new("bid_size_change").text(m.bid_size_change.to_string()))
        .child(XmlElement::new("ask_size_change").text(m.ask_size_change.to_string()));
    if with_transitions {
        el = el
            .child(XmlElement::new("bid_lifts").text(m.bid_lifts.to_string()))
            .child(XmlElement::new("bid_drops").text(m.bid_drops.to_string()))
            .child(XmlElement::new("ask_lifts").text(m.ask_lifts.to_string()))
            .child(XmlElement::new("ask_drops").text(m.ask_drops.to_string()));
    }
    if m.insufficient_data {
        el = el.child(XmlElement::new("insufficient_data").text("true"));
    }
    el
}

/// Size metrics come from the one-minute record, the canonical sizing
/// window; short histories fall back to the ten-second record.
fn size_source(data: &SnapshotData) -> WindowMetrics {
    if data.history_seconds >= Window::OneMin.seconds() {
        metrics_or_empty(&data.metrics_60s, Window::OneMin)
    } else {
        metrics_or_empty(&data.metrics_10s, Window::TenSec)
    }
}

fn size_metrics(data: &SnapshotData) -> XmlElement {
    let m = size_source(data);
    XmlElement::new("size_metrics")
        .child(
            XmlElement::new("large_orders")
                .child(XmlElement::new("bids_over_10k").text(m.large_bid_count.to_string()))
                .child(XmlElement::new("asks_over_10k").text(m.large_ask_count.to_string())),
        )
        .child(
            XmlElement::new("average_sizes")
                .child(XmlElement::new("bid_avg").text(m.avg_bid_size.to_string()))
                .child(XmlElement::new("ask_avg").text(m.avg_ask_size.to_string())),
        )
        .child(
            XmlElement::new("acceleration")
                .child(XmlElement::new("bid").text(m.bid_size_acceleration.as_str()))
                .child(XmlElement::new("ask").text(m.ask_size_acceleration.as_str())),
        )
        .child(
            XmlElement::new("spread_stats")
                .attr("avg", fmt_price(m.avg_spread))
                .attr("min", fmt_price(m.min_spread))
                .attr("max", fmt_price(m.max_spread))
                .attr("trend", m.spread_trend.as_str()),
        )
}

fn behaviors(flags: BehaviorFlags) -> XmlElement {
    XmlElement::new("behaviors")
        .child(XmlElement::new("bid_stacking").text(yes_no(flags.bid_stacking)))
        .child(XmlElement::new("ask_pulling").text(yes_no(flags.ask_pulling)))
        .child(XmlElement::new("spread_tightening").text(yes_no(flags.spread_tightening)))
        .child(XmlElement::new("momentum_building").text(yes_no(flags.momentum_building)))
        .child(XmlElement::new("aggressive_buying").text(yes_no(flags.aggressive_buying)))
        .child(XmlElement::new("aggressive_selling").text(yes_no(flags.aggressive_selling)))
}

fn price_levels(data: &SnapshotData, mid: f64) -> XmlElement {
    let mut el = XmlElement::new("price_levels");

    for level in &data.bid_levels {
        let distance = if mid > 0.0 {
            (mid - level.price) / mid * 100.0
        } else {
            0.0
        };
        el = el.child(level_element("bid_level", level, distance));
    }
    for level in &data.ask_levels {
        let distance = if mid > 0.0 {
            (level.price - mid) / mid * 100.0
        } else {
            0.0
        };
        el = el.child(level_element("ask_level", level, distance));
    }

    for sweep in data.patterns.iter().filter(|p| p.kind == PatternKind::Sweep) {
        let mut sweep_el = XmlElement::new("sweep")
            .attr("price", fmt_price(sweep.price_level.unwrap_or(0.0)))
            .attr("size", sweep.volume.unwrap_or(0).to_string());
        if let Some(side) = sweep.side {
            sweep_el = sweep_el.attr("side", side.as_str());
        }
        el = el.child(sweep_el.attr("seconds_ago", seconds_ago(data.now_ms, sweep.ts_ms)));
    }
    el
}

fn level_element(name: &str, level: &PriceLevel, distance_pct: f64) -> XmlElement {
    XmlElement::new(name)
        .attr("price", fmt_price(level.price))
        .attr("size", level.total_size.to_string())
        .attr("appearances", level.appearances.to_string())
        .attr("distance_pct", fmt_ratio(distance_pct))
}

/// Velocity numbers come from the widest cached window inside the
/// requested history.
fn velocity(data: &SnapshotData) -> XmlElement {
    let m = if data.history_seconds >= Window::FiveMin.seconds() && data.metrics_5min.is_some() {
        metrics_or_empty(&data.metrics_5min, Window::FiveMin)
    } else if data.history_seconds >= Window::OneMin.seconds() && data.metrics_60s.is_some() {
        metrics_or_empty(&data.metrics_60s, Window::OneMin)
    } else {
        metrics_or_empty(&data.metrics_10s, Window::TenSec)
    };

    let qps = data.quote_count as f64 / data.history_seconds.max(1) as f64;
    XmlElement::new("velocity")
        .child(XmlElement::new("quotes_per_second").text(fmt_ratio(qps)))
        .child(XmlElement::new("price_velocity").text(format!("{:.6}", m.price_velocity)))
        .child(XmlElement::new("size_turnover").text(format!("{:.0}", m.size_turnover)))
}

fn detected_patterns(data: &SnapshotData) -> Option<XmlElement> {
    if !data.include_patterns || data.patterns.is_empty() {
        return None;
    }

    let start = data.patterns.len().saturating_sub(MAX_RENDERED_PATTERNS);
    let mut el = XmlElement::new("detected_patterns")
        .attr("count", data.patterns.len().to_string())
        .attr("window", format!("{}s", data.history_seconds));

    for p in &data.patterns[start..] {
        el = el.child(pattern_element(p, data.now_ms));
    }
    Some(el)
}

fn pattern_element(p: &Pattern, now_ms: u64) -> XmlElement {
    let mut el = XmlElement::new("pattern").child(XmlElement::new("type").text(p.kind.as_str()));
    if let Some(side) = p.side {
        el = el.child(XmlElement::new("side").text(side.as_str()));
    }
    if let Some(direction) = p.direction {
        el = el.child(XmlElement::new("direction").text(direction.as_str()));
    }
    el = el.child(XmlElement::new("strength").text(p.strength.as_str()));
    if let Some(price) = p.price_level {
        el = el.child(XmlElement::new("price_level").text(fmt_price(price)));
    }
    if let Some(volume) = p.volume {
        el = el.child(XmlElement::new("volume").text(volume.to_string()));
    }
    if let Some(levels) = p.levels {
        el = el.child(XmlElement::new("levels").text(levels.to_string()));
    }
    el.child(XmlElement::new("description").text(p.description.clone()))
        .child(XmlElement::new("detected_seconds_ago").text(seconds_ago(now_ms, p.ts_ms)))
}

fn metrics_or_empty(m: &Option<WindowMetrics>, window: Window) -> WindowMetrics {
    m.clone().unwrap_or_else(|| WindowMetrics::insufficient(window, 0))
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "YES"
    } else {
        "NO"
    }
}

fn fmt_price(v: f64) -> String {
    format!("{:.4}", v)
}

fn fmt_ratio(v: f64) -> String {
    format!("{:.2}", v)
}

fn seconds_ago(now_ms: u64, ts_ms: u64) -> String {
    (now_ms.saturating_sub(ts_ms) / 1000).to_string()
}

fn iso_timestamp(now_ms: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms as i64)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00".to_string())
}

fn error_hints(error: &QueryError) -> ([&'static str; 3], [&'static str; 3]) {
    match error {
        QueryError::NoData => (
            [
                "No quotes received for this ticker yet",
                "The upstream publisher is not streaming this symbol",
                "All stored quotes fall outside the requested window",
            ],
            [
                "Verify the ticker symbol is correct",
                "Check that the quote publisher is running",
                "Retry with a longer history window",
            ],
        ),
        QueryError::InvalidTicker => (
            [
                "The ticker contains non-alphanumeric characters",
                "The ticker is empty or longer than 10 characters",
                "A company name was passed instead of a symbol",
            ],
            [
                "Use the exchange symbol, e.g. SPY or QQQ",
                "Strip spaces and punctuation from the symbol",
                "Keep the symbol between 1 and 10 characters",
            ],
        ),
        QueryError::InvalidHistory => (
            [
                "The history token is not a number followed by a unit",
                "The unit is not one of s, sec, secs, m, min, mins, h, hr, hrs",
                "The duration is zero or negative",
            ],
            [
                "Use a form like 30s, 5mins or 1h",
                "Keep the window between 5 seconds and 1 hour",
                "Omit the argument to analyze the default 5 minutes",
            ],
        ),
        QueryError::StoreUnavailable => (
            [
                "The backing store is down or unreachable",
                "A network partition separates the engine from the store",
                "The store is overloaded and timing out",
            ],
            [
                "Check the storage backend is running",
                "Verify connectivity between engine and store",
                "Retry the query after a short delay",
            ],
        ),
        QueryError::Timeout => (
            [
                "The query deadline elapsed before reads completed",
                "The backing store responded slowly",
                "The engine is under heavy concurrent load",
            ],
            [
                "Retry the query",
                "Raise the query deadline if the caller allows it",
                "Check store latency and engine load",
            ],
        ),
        QueryError::Internal(_) => (
            [
                "A derivation failed unexpectedly",
                "Stored derived data is inconsistent",
                "The engine hit an unanticipated edge case",
            ],
            [
                "Retry the query",
                "Check engine logs for the reported code",
                "Report the code if the failure persists",
            ],
        ),
    }
}
