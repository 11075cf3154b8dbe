//! Per-tick market snapshot handed to every strategy.

use mmsim_core::{BookTop, MarketId, OrderSide, Price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Read-only view of a market at decision time.
///
/// The engine assembles one context per bot round and hands the same
/// snapshot to every strategy in the population. Strategies never see the
/// tracker or the order book directly.
#[derive(Debug, Clone)]
pub struct MarketContext {
    pub market_id: MarketId,
    pub current_price: Price,
    pub target_price: Price,
    pub range_low: Price,
    pub range_high: Price,
    /// Rolling volatility over the tracker window, in percent.
    pub volatility_pct: Decimal,
    /// Change from the oldest tracked sample to now, in percent.
    pub change_pct: Decimal,
    /// Change over the most recent sample pair, in percent. Scalpers fade
    /// this; everyone else ignores it.
    pub micro_change_pct: Decimal,
    pub book_top: Option<BookTop>,
    /// Side the coordinator would prefer to see next, if pressure is
    /// lopsided enough to have an opinion.
    pub recommended_side: Option<OrderSide>,
    pub now_ms: u64,
}

impl MarketContext {
    /// Current top-of-book spread in basis points, when both sides are quoted.
    #[must_use]
    pub fn spread_bps(&self) -> Option<Decimal> {
        self.book_top.as_ref().and_then(BookTop::spread_bps)
    }

    /// True when the current price sits within `band_pct` percent of the
    /// range floor.
    #[must_use]
    pub fn near_low(&self, band_pct: Decimal) -> bool {
        let ceiling = self.range_low.inner() * (Decimal::ONE + band_pct / dec!(100));
        self.current_price.inner() <= ceiling
    }

    /// True when the current price sits within `band_pct` percent of the
    /// range ceiling.
    #[must_use]
    pub fn near_high(&self, band_pct: Decimal) -> bool {
        let floor = self.range_high.inner() * (Decimal::ONE - band_pct / dec!(100));
        self.current_price.inner() >= floor
    }

    /// Clamp a candidate quote into the configured price range.
    #[must_use]
    pub fn clamp(&self, price: Price) -> Price {
        price.clamp_to(self.range_low, self.range_high)
    }

    /// Signed distance of the current price from target, in percent.
    #[must_use]
    pub fn distance_from_target_pct(&self) -> Decimal {
        self.current_price
            .pct_from(self.target_price)
            .unwrap_or_default()
    }
}
