//! Rolling trade window and market pressure.

use std::collections::VecDeque;

use mmsim_core::{BotId, OrderSide, Price, Size};
use rust_decimal::Decimal;
use serde::Serialize;

/// How long executed trades stay visible to coordination rules.
pub const DEFAULT_RETENTION_MS: u64 = 60_000;

/// One executed trade as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedTrade {
    pub bot: BotId,
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
    pub at_ms: u64,
}

/// Buy/sell imbalance over the retained trade window.
///
/// `net_pressure = (buy - sell) / (buy + sell)`, in [-1, 1];
/// zero when the window is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarketPressure {
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    pub net_pressure: Decimal,
    pub last_update_ms: u64,
}

impl MarketPressure {
    #[must_use]
    pub fn balanced() -> Self {
        Self {
            buy_volume: Decimal::ZERO,
            sell_volume: Decimal::ZERO,
            net_pressure: Decimal::ZERO,
            last_update_ms: 0,
        }
    }

    /// True when the buy side dominates beyond `threshold`.
    #[must_use]
    pub fn buy_heavy(&self, threshold: Decimal) -> bool {
        self.net_pressure > threshold
    }

    /// True when the sell side dominates beyond `threshold`.
    #[must_use]
    pub fn sell_heavy(&self, threshold: Decimal) -> bool {
        self.net_pressure < -threshold
    }
}

impl Default for MarketPressure {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Bounded-by-time window of recent trades for one market.
#[derive(Debug)]
pub struct TradeWindow {
    trades: VecDeque<RecordedTrade>,
    retention_ms: u64,
}

impl TradeWindow {
    #[must_use]
    pub fn new(retention_ms: u64) -> Self {
        Self {
            trades: VecDeque::new(),
            retention_ms,
        }
    }

    /// Append a trade and drop everything older than the retention.
    pub fn push(&mut self, trade: RecordedTrade) {
        let now_ms = trade.at_ms;
        self.trades.push_back(trade);
        self.prune(now_ms);
    }

    /// Drop trades that have aged out of the window.
    pub fn prune(&mut self, now_ms: u64) {
        while let Some(front) = self.trades.front() {
            if now_ms.saturating_sub(front.at_ms) > self.retention_ms {
                self.trades.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordedTrade> {
        self.trades.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Recompute pressure from the trades still inside the window.
    #[must_use]
    pub fn pressure(&self, now_ms: u64) -> MarketPressure {
        let mut buy = Decimal::ZERO;
        let mut sell = Decimal::ZERO;
        for trade in &self.trades {
            match trade.side {
                OrderSide::Buy => buy += trade.amount.inner(),
                OrderSide::Sell => sell += trade.amount.inner(),
            }
        }
        let total = buy + sell;
        let net = if total.is_zero() {
            Decimal::ZERO
        } else {
            (buy - sell) / total
        };
        MarketPressure {
            buy_volume: buy,
            sell_volume: sell,
            net_pressure: net,
            last_update_ms: now_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn trade(side: OrderSide, amount: Decimal, at_ms: u64) -> RecordedTrade {
        RecordedTrade {
            bot: BotId::generate(),
            side,
            price: Price::new(dec!(100)),
            amount: Size::new(amount),
            at_ms,
        }
    }

    #[test]
    fn test_empty_window_balanced() {
        let window = TradeWindow::new(DEFAULT_RETENTION_MS);
        let p = window.pressure(0);
        assert_eq!(p.net_pressure, Decimal::ZERO);
        assert_eq!(p.buy_volume, Decimal::ZERO);
    }

    #[test]
    fn test_net_pressure_formula() {
        let mut window = TradeWindow::new(DEFAULT_RETENTION_MS);
        window.push(trade(OrderSide::Buy, dec!(70), 1_000));
        window.push(trade(OrderSide::Sell, dec!(30), 2_000));

        let p = window.pressure(2_000);
        assert_eq!(p.buy_volume, dec!(70));
        assert_eq!(p.sell_volume, dec!(30));
        // (70 - 30) / 100 = 0.4
        assert_eq!(p.net_pressure, dec!(0.4));
        assert!(p.buy_heavy(dec!(0.3)));
        assert!(!p.sell_heavy(dec!(0.3)));
    }

    #[test]
    fn test_net_pressure_bounded() {
        let mut window = TradeWindow::new(DEFAULT_RETENTION_MS);
        window.push(trade(OrderSide::Sell, dec!(50), 0));
        let p = window.pressure(0);
        assert_eq!(p.net_pressure, dec!(-1));

        window.push(trade(OrderSide::Buy, dec!(50), 100));
        let p = window.pressure(100);
        assert_eq!(p.net_pressure, Decimal::ZERO);
    }

    #[test]
    fn test_old_trades_age_out() {
        let mut window = TradeWindow::new(60_000);
        window.push(trade(OrderSide::Buy, dec!(100), 0));
        window.push(trade(OrderSide::Sell, dec!(10), 61_000));

        // The buy at t=0 is outside the 60s window at t=61s.
        assert_eq!(window.len(), 1);
        let p = window.pressure(61_000);
        assert_eq!(p.buy_volume, Decimal::ZERO);
        assert_eq!(p.net_pressure, dec!(-1));
    }

    #[test]
    fn test_prune_without_push() {
        let mut window = TradeWindow::new(60_000);
        window.push(trade(OrderSide::Buy, dec!(5), 0));
        window.prune(59_000);
        assert_eq!(window.len(), 1);
        window.prune(60_001);
        assert!(window.is_empty());
    }
}
