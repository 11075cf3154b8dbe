//! Per-market coordination state and the arbitration entry point.

use dashmap::DashMap;
use mmsim_core::{BotId, MarketId, OrderSide, TradeDecision};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::pressure::{MarketPressure, RecordedTrade, TradeWindow, DEFAULT_RETENTION_MS};
use crate::rules::{CoordinationRule, RuleOutcome, IMBALANCE_THRESHOLD};

pub use crate::rules::CoordinationContext;

/// Outcome of running a decision through the active rule set.
#[derive(Debug, Clone)]
pub enum Coordination {
    /// Decision may execute, possibly with adjusted price/amount.
    Approved {
        decision: TradeDecision,
        adjusted: bool,
    },
    /// Decision must be skipped this round.
    Rejected {
        rule: CoordinationRule,
        reason: String,
    },
}

impl Coordination {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

struct CoordState {
    rules: Vec<CoordinationRule>,
    window: TradeWindow,
    pressure: MarketPressure,
}

impl CoordState {
    fn new(retention_ms: u64) -> Self {
        Self {
            rules: CoordinationRule::DEFAULT_SET.to_vec(),
            window: TradeWindow::new(retention_ms),
            pressure: MarketPressure::balanced(),
        }
    }
}

/// Arbitrates bot decisions against per-market shared state.
///
/// Mutations of one market's window/pressure are serialized by the
/// per-market mutex; different markets never contend.
pub struct BotCoordinator {
    markets: DashMap<MarketId, Mutex<CoordState>>,
    retention_ms: u64,
}

impl Default for BotCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl BotCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION_MS)
    }

    #[must_use]
    pub fn with_retention(retention_ms: u64) -> Self {
        Self {
            markets: DashMap::new(),
            retention_ms,
        }
    }

    /// Ensure per-market state exists with the default rule set.
    pub fn register_market(&self, market: MarketId) {
        self.markets
            .entry(market)
            .or_insert_with(|| Mutex::new(CoordState::new(self.retention_ms)));
    }

    /// Replace the active rule set (applied in the given order).
    pub fn set_rules(&self, market: MarketId, rules: Vec<CoordinationRule>) {
        let entry = self
            .markets
            .entry(market)
            .or_insert_with(|| Mutex::new(CoordState::new(self.retention_ms)));
        entry.lock().rules = rules;
    }

    #[must_use]
    pub fn active_rules(&self, market: MarketId) -> Vec<CoordinationRule> {
        self.markets
            .get(&market)
            .map(|s| s.lock().rules.clone())
            .unwrap_or_default()
    }

    /// Run a decision through the active rules.
    ///
    /// Each rule sees the output of the previous one; the first rejection
    /// wins. A rejection is a normal skip, not an error.
    pub fn coordinate_trade(
        &self,
        market: MarketId,
        bot: BotId,
        decision: TradeDecision,
        ctx: &CoordinationContext,
    ) -> Coordination {
        let entry = self
            .markets
            .entry(market)
            .or_insert_with(|| Mutex::new(CoordState::new(self.retention_ms)));
        let mut state = entry.lock();

        state.window.prune(ctx.now_ms);
        state.pressure = state.window.pressure(ctx.now_ms);

        let rules = state.rules.clone();
        let mut current = decision;
        let mut adjusted = false;

        for rule in rules {
            match rule.apply(bot, &current, &state.window, &state.pressure, ctx) {
                RuleOutcome::Pass => {}
                RuleOutcome::Adjust(next) => {
                    current = next;
                    adjusted = true;
                }
                RuleOutcome::Reject(reason) => {
                    debug!(
                        market = %market,
                        bot = %bot,
                        rule = %rule,
                        reason = %reason,
                        "decision rejected by coordination"
                    );
                    return Coordination::Rejected { rule, reason };
                }
            }
        }

        Coordination::Approved {
            decision: current,
            adjusted,
        }
    }

    /// Record an executed trade into the market's window and pressure.
    pub fn record_trade(&self, market: MarketId, trade: RecordedTrade) {
        let entry = self
            .markets
            .entry(market)
            .or_insert_with(|| Mutex::new(CoordState::new(self.retention_ms)));
        let mut state = entry.lock();
        let at_ms = trade.at_ms;
        state.window.push(trade);
        state.pressure = state.window.pressure(at_ms);
        trace!(
            market = %market,
            net_pressure = %state.pressure.net_pressure.round_dp(4),
            window_len = state.window.len(),
            "trade recorded"
        );
    }

    /// The side that would reduce an imbalance beyond the threshold,
    /// `None` while the market is balanced enough.
    #[must_use]
    pub fn recommended_side(&self, market: MarketId, now_ms: u64) -> Option<OrderSide> {
        let pressure = self.pressure(market, now_ms);
        if pressure.buy_heavy(IMBALANCE_THRESHOLD) {
            Some(OrderSide::Sell)
        } else if pressure.sell_heavy(IMBALANCE_THRESHOLD) {
            Some(OrderSide::Buy)
        } else {
            None
        }
    }

    /// Current pressure after expiring stale window entries.
    #[must_use]
    pub fn pressure(&self, market: MarketId, now_ms: u64) -> MarketPressure {
        match self.markets.get(&market) {
            Some(state) => {
                let mut state = state.lock();
                state.window.prune(now_ms);
                state.pressure = state.window.pressure(now_ms);
                state.pressure
            }
            None => MarketPressure::balanced(),
        }
    }

    #[must_use]
    pub fn recent_trade_count(&self, market: MarketId) -> usize {
        self.markets
            .get(&market)
            .map_or(0, |s| s.lock().window.len())
    }

    /// Drop all per-market state; called when a market is torn down.
    pub fn clear_market(&self, market: MarketId) {
        self.markets.remove(&market);
    }

    #[must_use]
    pub fn market_count(&self) -> usize {
        self.markets.len()
    }
}
