//! Prometheus metrics for the simulation engine.
//!
//! Covers the signals operators watch:
//! - Tick throughput and tick errors per market
//! - Executed trades, split by side, purpose and liquidity kind
//! - Coordination rejections and risk gate skips
//! - Simulated price, net pressure and bot population gauges
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};

/// Total processed ticks per market.
pub static TICKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("mmsim_ticks_total", "Total processed ticks", &["market"]).unwrap()
});

/// Total executed trades.
/// Labels: market, side (buy/sell), purpose, kind (real/ai_only)
pub static TRADES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mmsim_trades_total",
        "Total executed trades",
        &["market", "side", "purpose", "kind"]
    )
    .unwrap()
});

/// Cumulative traded base volume per market.
pub static TRADE_VOLUME_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mmsim_trade_volume_total",
        "Cumulative traded base volume",
        &["market"]
    )
    .unwrap()
});

/// Total bot trades rejected by coordination rules.
/// Labels: market, rule (ANTI_COLLISION/PRICE_COORDINATION/...)
pub static COORDINATION_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mmsim_coordination_rejections_total",
        "Total bot trades rejected by coordination rules",
        &["market", "rule"]
    )
    .unwrap()
});

/// Total ticks skipped by a gate.
/// Labels: market, gate (insufficient_bots/volume_cap/breaker_open/...)
pub static GATE_SKIPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mmsim_gate_skips_total",
        "Total ticks skipped by a risk or readiness gate",
        &["market", "gate"]
    )
    .unwrap()
});

/// Current simulated price per market.
pub static SIMULATED_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "mmsim_simulated_price",
        "Current simulated price",
        &["market"]
    )
    .unwrap()
});

/// Net buy-sell pressure in the coordination window.
pub static NET_PRESSURE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "mmsim_net_pressure",
        "Net buy-sell volume in the coordination window",
        &["market"]
    )
    .unwrap()
});

/// Total errored operations per market.
pub static TICK_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "mmsim_tick_errors_total",
        "Total errored tick operations",
        &["market"]
    )
    .unwrap()
});

/// Circuit breaker state (1=open, 0=closed).
pub static CIRCUIT_BREAKER_OPEN: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "mmsim_circuit_breaker_open",
        "Circuit breaker state (1=open, 0=closed)",
        &["market"]
    )
    .unwrap()
});

/// Active bots per market.
pub static ACTIVE_BOTS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("mmsim_active_bots", "Currently active bots", &["market"]).unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a processed tick.
    pub fn tick(market: &str) {
        TICKS_TOTAL.with_label_values(&[market]).inc();
    }

    /// Record an executed trade.
    pub fn trade(market: &str, side: &str, purpose: &str, kind: &str) {
        TRADES_TOTAL
            .with_label_values(&[market, side, purpose, kind])
            .inc();
    }

    /// Add traded base volume.
    pub fn trade_volume(market: &str, amount: f64) {
        TRADE_VOLUME_TOTAL
            .with_label_values(&[market])
            .inc_by(amount.max(0.0));
    }

    /// Record a coordination rejection.
    pub fn coordination_rejected(market: &str, rule: &str) {
        COORDINATION_REJECTIONS_TOTAL
            .with_label_values(&[market, rule])
            .inc();
    }

    /// Record a gate skip.
    pub fn gate_skip(market: &str, gate: &str) {
        GATE_SKIPS_TOTAL.with_label_values(&[market, gate]).inc();
    }

    /// Update the simulated price gauge.
    pub fn price(market: &str, price: f64) {
        SIMULATED_PRICE.with_label_values(&[market]).set(price);
    }

    /// Update net pressure.
    pub fn net_pressure(market: &str, net: f64) {
        NET_PRESSURE.with_label_values(&[market]).set(net);
    }

    /// Record an errored tick operation.
    pub fn tick_error(market: &str) {
        TICK_ERRORS_TOTAL.with_label_values(&[market]).inc();
    }

    /// Set circuit breaker state.
    pub fn breaker_open(market: &str, is_open: bool) {
        CIRCUIT_BREAKER_OPEN
            .with_label_values(&[market])
            .set(if is_open { 1.0 } else { 0.0 });
    }

    /// Update the active bot gauge.
    pub fn active_bots(market: &str, count: usize) {
        ACTIVE_BOTS.with_label_values(&[market]).set(count as f64);
    }
}
