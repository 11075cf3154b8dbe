//! Daily loss accounting and consecutive-loss protection.
//!
//! Tracks realized PnL per market and globally, on a calendar-day basis.
//! The day rollover is lazy: every accessor first checks whether the
//! provided timestamp belongs to a new UTC day and clears the ledgers if
//! so, which keeps the component free of background timers.

use std::collections::HashMap;

use mmsim_core::{day_number, MarketId};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Consecutive losing trades after which a market should stop trading.
pub const DEFAULT_MAX_CONSECUTIVE_LOSSES: u32 = 5;

#[derive(Debug, Default, Clone)]
struct MarketLedger {
    /// Sum of absolute losing PnL for the current day.
    daily_loss: Decimal,
    /// Sum of winning PnL for the current day.
    daily_profit: Decimal,
    consecutive_losses: u32,
    /// Capital tracked for the global loss percentage; survives rollover.
    capital: Decimal,
}

/// Point-in-time view of one market's loss ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LossSnapshot {
    pub daily_loss: Decimal,
    pub daily_profit: Decimal,
    /// `daily_loss - daily_profit`; negative when the day is net positive.
    pub net_loss: Decimal,
    pub consecutive_losses: u32,
}

struct Inner {
    day: u64,
    markets: HashMap<MarketId, MarketLedger>,
}

/// Per-market and global daily loss tracker.
///
/// Thread-safe; share via `Arc<LossProtection>`.
pub struct LossProtection {
    inner: Mutex<Inner>,
    max_consecutive_losses: u32,
}

impl Default for LossProtection {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONSECUTIVE_LOSSES)
    }
}

impl LossProtection {
    #[must_use]
    pub fn new(max_consecutive_losses: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                day: 0,
                markets: HashMap::new(),
            }),
            max_consecutive_losses: max_consecutive_losses.max(1),
        }
    }

    /// Track a market with the capital backing it (e.g. its pool TVL).
    /// Re-registering updates the capital and keeps the day's counters.
    pub fn register_market(&self, market: MarketId, capital: Decimal, now_ms: u64) {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);
        inner.markets.entry(market).or_default().capital = capital.max(Decimal::ZERO);
    }

    /// Drop all state for a market being torn down.
    pub fn remove_market(&self, market: MarketId) {
        self.inner.lock().markets.remove(&market);
    }

    /// Record a realized PnL. Losses extend the consecutive-loss streak;
    /// any profit resets it. Zero PnL touches neither.
    pub fn record_trade(&self, market: MarketId, pnl: Decimal, now_ms: u64) {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);
        let ledger = inner.markets.entry(market).or_default();

        if pnl < Decimal::ZERO {
            ledger.daily_loss += -pnl;
            ledger.consecutive_losses += 1;
            debug!(
                market = %market,
                pnl = %pnl,
                consecutive = ledger.consecutive_losses,
                daily_loss = %ledger.daily_loss,
                "losing trade recorded"
            );
            if ledger.consecutive_losses == self.max_consecutive_losses {
                warn!(
                    market = %market,
                    streak = ledger.consecutive_losses,
                    "consecutive loss threshold reached"
                );
            }
        } else if pnl > Decimal::ZERO {
            ledger.daily_profit += pnl;
            ledger.consecutive_losses = 0;
        }
    }

    /// Whether the consecutive-loss streak says this market must stop.
    #[must_use]
    pub fn should_stop_trading(&self, market: MarketId, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);
        inner
            .markets
            .get(&market)
            .is_some_and(|l| l.consecutive_losses >= self.max_consecutive_losses)
    }

    /// Whether the global net daily loss exceeds `max_percent` of the
    /// total tracked capital. False when no capital is tracked.
    #[must_use]
    pub fn global_loss_exceeds(&self, max_percent: Decimal, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);

        let mut net_loss = Decimal::ZERO;
        let mut capital = Decimal::ZERO;
        for ledger in inner.markets.values() {
            net_loss += ledger.daily_loss - ledger.daily_profit;
            capital += ledger.capital;
        }
        if capital <= Decimal::ZERO {
            return false;
        }
        net_loss / capital * Decimal::from(100) > max_percent
    }

    /// Global net daily loss across all markets (negative = net profit).
    #[must_use]
    pub fn global_net_loss(&self, now_ms: u64) -> Decimal {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);
        inner
            .markets
            .values()
            .map(|l| l.daily_loss - l.daily_profit)
            .sum()
    }

    #[must_use]
    pub fn consecutive_losses(&self, market: MarketId, now_ms: u64) -> u32 {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);
        inner
            .markets
            .get(&market)
            .map_or(0, |l| l.consecutive_losses)
    }

    #[must_use]
    pub fn market_snapshot(&self, market: MarketId, now_ms: u64) -> Option<LossSnapshot> {
        let mut inner = self.inner.lock();
        Self::roll_day(&mut inner, now_ms);
        inner.markets.get(&market).map(|l| LossSnapshot {
            daily_loss: l.daily_loss,
            daily_profit: l.daily_profit,
            net_loss: l.daily_loss - l.daily_profit,
            consecutive_losses: l.consecutive_losses,
        })
    }

    /// Force the daily reset now (used by the scheduled midnight task;
    /// the lazy rollover makes this a safety net rather than a requirement).
    pub fn reset_daily(&self, now_ms: u64) {
        let mut inner = self.inner.lock();
        let day = day_number(now_ms);
        Self::clear_ledgers(&mut inner, day);
    }

    fn roll_day(inner: &mut Inner, now_ms: u64) {
        let day = day_number(now_ms);
        if inner.day != day {
            Self::clear_ledgers(inner, day);
        }
    }

    fn clear_ledgers(inner: &mut Inner, day: u64) {
        if inner.day != 0 && !inner.markets.is_empty() {
            info!(new_day = day, "daily loss ledgers reset");
        }
        inner.day = day;
        for ledger in inner.markets.values_mut() {
            ledger.daily_loss = Decimal::ZERO;
            ledger.daily_profit = Decimal::ZERO;
            ledger.consecutive_losses = 0;
        }
    }
}
