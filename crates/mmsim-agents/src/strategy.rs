//! Personality strategy trait.

use crate::context::MarketContext;
use crate::timing::SizeGenerator;
use mmsim_core::{BotConfig, OrderSide, Personality, Price, Size, TradeDecision};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// A trading personality.
///
/// Implementations are mutable state machines owned by exactly one bot.
/// `decide_trade` proposes a trade for the current round or returns `None`
/// to sit it out; skipping is the common case, not a failure. State
/// transitions that depend on a trade actually happening belong in
/// [`on_fill`], because the coordinator may veto any proposed decision.
///
/// [`on_fill`]: Strategy::on_fill
pub trait Strategy: Send {
    fn personality(&self) -> Personality;

    /// Propose a trade for this round, or skip.
    fn decide_trade(
        &mut self,
        config: &BotConfig,
        ctx: &MarketContext,
        rng: &mut StdRng,
    ) -> Option<TradeDecision>;

    /// Draw an order size around the configured average.
    fn order_size(&self, config: &BotConfig, _ctx: &MarketContext, rng: &mut StdRng) -> Size {
        SizeGenerator::sample(
            config.avg_order_size,
            self.personality().size_multiplier(),
            config.order_size_variance,
            rng,
        )
    }

    /// Quote a price on `side`, half the preferred spread away from the
    /// current price with a little jitter, clamped into the range.
    fn quote_price(
        &self,
        config: &BotConfig,
        ctx: &MarketContext,
        side: OrderSide,
        rng: &mut StdRng,
    ) -> Price {
        let half = config.preferred_spread_bps / Decimal::TWO;
        let jitter =
            Decimal::from_f64_retain(rng.gen_range(0.75..=1.25)).unwrap_or(Decimal::ONE);
        let offset = (half * jitter).round_dp(4);
        let quoted = match side {
            OrderSide::Buy => ctx.current_price.offset_bps(-offset),
            OrderSide::Sell => ctx.current_price.offset_bps(offset),
        };
        ctx.clamp(quoted)
    }

    /// Effective cooldown after a completed trade.
    fn cooldown_ms(&self, config: &BotConfig) -> u64 {
        config.cooldown_ms()
    }

    /// Notification that a proposed trade was actually executed.
    fn on_fill(
        &mut self,
        _side: OrderSide,
        _price: Price,
        _amount: Size,
        _now_ms: u64,
        _rng: &mut StdRng,
    ) {
    }
}

/// Confidence helper shared by the personalities: a base level bumped by a
/// signal magnitude, capped at `0.95`.
#[must_use]
pub(crate) fn confidence(base: f64, signal: Decimal) -> f64 {
    let bump = signal.abs().min(dec!(0.3)).to_f64().unwrap_or(0.0);
    (base + bump).clamp(0.0, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MarketContext;
    use mmsim_core::{BotId, MarketId};
    use rand::SeedableRng;

    struct Fixed;

    impl Strategy for Fixed {
        fn personality(&self) -> Personality {
            Personality::Scalper
        }

        fn decide_trade(
            &mut self,
            _config: &BotConfig,
            _ctx: &MarketContext,
            _rng: &mut StdRng,
        ) -> Option<TradeDecision> {
            None
        }
    }

    fn ctx() -> MarketContext {
        MarketContext {
            market_id: MarketId(1),
            current_price: Price::new(dec!(100)),
            target_price: Price::new(dec!(100)),
            range_low: Price::new(dec!(95)),
            range_high: Price::new(dec!(105)),
            volatility_pct: Decimal::ZERO,
            change_pct: Decimal::ZERO,
            micro_change_pct: Decimal::ZERO,
            book_top: None,
            recommended_side: None,
            now_ms: 0,
        }
    }

    #[test]
    fn default_quote_straddles_current() {
        let cfg = BotConfig::sample(BotId::generate(), Personality::Scalper);
        let strategy = Fixed;
        let mut rng = StdRng::seed_from_u64(3);
        let c = ctx();

        for _ in 0..50 {
            let bid = strategy.quote_price(&cfg, &c, OrderSide::Buy, &mut rng);
            let ask = strategy.quote_price(&cfg, &c, OrderSide::Sell, &mut rng);
            assert!(bid < c.current_price);
            assert!(ask > c.current_price);
        }
    }

    #[test]
    fn default_quote_clamped_into_range() {
        let cfg = BotConfig::sample(BotId::generate(), Personality::Swing);
        let strategy = Fixed;
        let mut rng = StdRng::seed_from_u64(3);
        let mut c = ctx();
        c.current_price = Price::new(dec!(95.001));

        for _ in 0..50 {
            let bid = strategy.quote_price(&cfg, &c, OrderSide::Buy, &mut rng);
            assert!(bid >= c.range_low);
        }
    }

    #[test]
    fn confidence_caps() {
        assert!(confidence(0.9, dec!(5.0)) <= 0.95);
        assert!((confidence(0.5, Decimal::ZERO) - 0.5).abs() < f64::EPSILON);
    }
}
