//! Snapshot types reported by the engine.

use crate::market_instance::LifecycleState;
use mmsim_core::{MarketId, Price};
use rust_decimal::Decimal;
use serde::Serialize;

/// Point-in-time view of one market loop.
#[derive(Debug, Clone, Serialize)]
pub struct MarketStats {
    pub market_id: MarketId,
    pub symbol: String,
    pub state: LifecycleState,
    pub current_price: Price,
    pub target_price: Price,
    pub volatility_pct: Decimal,
    pub tick_count: u64,
    pub trades_executed: u64,
    /// Lifetime errored operations, kept across resumes.
    pub error_count: u64,
    pub daily_volume: Decimal,
    pub volume_cap: Decimal,
    pub active_bots: usize,
    pub total_bots: usize,
    pub breaker_tripped: bool,
    pub trading_halted: bool,
}

/// Aggregate across every registered market.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub markets: usize,
    pub running: usize,
    pub paused: usize,
    pub total_trades: u64,
    pub total_volume: Decimal,
    pub per_market: Vec<MarketStats>,
}

impl EngineStats {
    #[must_use]
    pub fn from_markets(per_market: Vec<MarketStats>) -> Self {
        let markets = per_market.len();
        let running = per_market
            .iter()
            .filter(|m| m.state == LifecycleState::Running)
            .count();
        let paused = per_market
            .iter()
            .filter(|m| m.state == LifecycleState::Paused)
            .count();
        let total_trades = per_market.iter().map(|m| m.trades_executed).sum();
        let total_volume = per_market.iter().map(|m| m.daily_volume).sum();
        Self {
            markets,
            running,
            paused,
            total_trades,
            total_volume,
            per_market,
        }
    }
}
