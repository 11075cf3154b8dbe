//! Accumulator and distributor: patient one-sided pressure.

use crate::context::MarketContext;
use crate::strategy::Strategy;
use mmsim_core::{BotConfig, OrderSide, Personality, TradeDecision, TradePurpose};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Window change past which the price has run ahead of the bias and the
/// strategy waits for it to come back.
const CHASE_GUARD_PCT: Decimal = dec!(2);
/// Chance to trade against the bias to recycle inventory.
const CONTRARIAN_PROBABILITY: f64 = 0.1;
/// Band around the favored boundary where orders get bigger.
const BOUNDARY_BAND_PCT: Decimal = dec!(1);
/// Size multiplier applied at the favored boundary.
const BOUNDARY_INTENSITY: Decimal = dec!(1.5);

/// One strategy, two personalities: the accumulator leans `Buy` and builds
/// support near the range floor, the distributor leans `Sell` and builds
/// resistance near the ceiling. Everything else is a mirror image.
#[derive(Debug)]
pub struct BiasStrategy {
    personality: Personality,
    bias: OrderSide,
}

impl BiasStrategy {
    #[must_use]
    pub fn accumulator() -> Self {
        Self {
            personality: Personality::Accumulator,
            bias: OrderSide::Buy,
        }
    }

    #[must_use]
    pub fn distributor() -> Self {
        Self {
            personality: Personality::Distributor,
            bias: OrderSide::Sell,
        }
    }

    /// Price has already moved the way this bias pushes.
    fn ran_ahead(&self, ctx: &MarketContext) -> bool {
        match self.bias {
            OrderSide::Buy => ctx.change_pct > CHASE_GUARD_PCT,
            OrderSide::Sell => ctx.change_pct < -CHASE_GUARD_PCT,
        }
    }

    /// Near the boundary this bias defends.
    fn at_own_boundary(&self, ctx: &MarketContext) -> bool {
        match self.bias {
            OrderSide::Buy => ctx.near_low(BOUNDARY_BAND_PCT),
            OrderSide::Sell => ctx.near_high(BOUNDARY_BAND_PCT),
        }
    }
}

impl Strategy for BiasStrategy {
    fn personality(&self) -> Personality {
        self.personality
    }

    fn decide_trade(
        &mut self,
        config: &BotConfig,
        ctx: &MarketContext,
        rng: &mut StdRng,
    ) -> Option<TradeDecision> {
        if self.ran_ahead(ctx) {
            return None;
        }

        if rng.gen_bool(CONTRARIAN_PROBABILITY) {
            let side = self.bias.opposite();
            let price = self.quote_price(config, ctx, side, rng);
            let amount = self.order_size(config, ctx, rng);
            return TradeDecision::new(
                side,
                price,
                amount,
                TradePurpose::Liquidity,
                0.4,
                "recycling inventory against the bias",
            )
            .ok();
        }

        let price = self.quote_price(config, ctx, self.bias, rng);
        let mut amount = self.order_size(config, ctx, rng);
        let (reason, conf) = if self.at_own_boundary(ctx) {
            amount = amount.scaled(BOUNDARY_INTENSITY);
            match self.bias {
                OrderSide::Buy => ("building support at the range floor", 0.75),
                OrderSide::Sell => ("building resistance at the range ceiling", 0.75),
            }
        } else {
            match self.bias {
                OrderSide::Buy => ("steady accumulation", 0.6),
                OrderSide::Sell => ("steady distribution", 0.6),
            }
        };

        TradeDecision::new(self.bias, price, amount, TradePurpose::PricePush, conf, reason).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmsim_core::{BotId, MarketId, Price};
    use rand::SeedableRng;

    fn ctx(price: Decimal) -> MarketContext {
        MarketContext {
            market_id: MarketId(1),
            current_price: Price::new(price),
            target_price: Price::new(dec!(100)),
            range_low: Price::new(dec!(95)),
            range_high: Price::new(dec!(105)),
            volatility_pct: dec!(0.5),
            change_pct: Decimal::ZERO,
            micro_change_pct: Decimal::ZERO,
            book_top: None,
            recommended_side: None,
            now_ms: 0,
        }
    }

    fn config(personality: Personality) -> BotConfig {
        let mut cfg = BotConfig::sample(BotId::generate(), personality);
        cfg.order_size_variance = Decimal::ZERO;
        cfg
    }

    #[test]
    fn accumulator_mostly_buys() {
        let mut s = BiasStrategy::accumulator();
        let mut rng = StdRng::seed_from_u64(1);
        let cfg = config(Personality::Accumulator);
        let c = ctx(dec!(100));

        let mut buys = 0;
        let mut sells = 0;
        for _ in 0..300 {
            match s.decide_trade(&cfg, &c, &mut rng) {
                Some(d) if d.side == OrderSide::Buy => buys += 1,
                Some(_) => sells += 1,
                None => {}
            }
        }
        assert!(buys > 200, "buys {buys}");
        assert!(sells < 60, "sells {sells}");
    }

    #[test]
    fn distributor_mostly_sells() {
        let mut s = BiasStrategy::distributor();
        let mut rng = StdRng::seed_from_u64(2);
        let cfg = config(Personality::Distributor);
        let c = ctx(dec!(100));

        let mut sells = 0;
        for _ in 0..300 {
            if let Some(d) = s.decide_trade(&cfg, &c, &mut rng) {
                if d.side == OrderSide::Sell {
                    sells += 1;
                }
            }
        }
        assert!(sells > 200, "sells {sells}");
    }

    #[test]
    fn accumulator_waits_after_a_rally() {
        let mut s = BiasStrategy::accumulator();
        let mut rng = StdRng::seed_from_u64(3);
        let cfg = config(Personality::Accumulator);
        let mut c = ctx(dec!(102));
        c.change_pct = dec!(2.5);

        for _ in 0..100 {
            assert!(s.decide_trade(&cfg, &c, &mut rng).is_none());
        }
    }

    #[test]
    fn distributor_trades_into_a_rally() {
        let mut s = BiasStrategy::distributor();
        let mut rng = StdRng::seed_from_u64(4);
        let cfg = config(Personality::Distributor);
        let mut c = ctx(dec!(102));
        c.change_pct = dec!(2.5);

        let decisions = (0..100)
            .filter_map(|_| s.decide_trade(&cfg, &c, &mut rng))
            .count();
        assert!(decisions > 50, "decisions {decisions}");
    }

    #[test]
    fn distributor_waits_after_a_selloff() {
        let mut s = BiasStrategy::distributor();
        let mut rng = StdRng::seed_from_u64(5);
        let cfg = config(Personality::Distributor);
        let mut c = ctx(dec!(97));
        c.change_pct = dec!(-2.5);

        for _ in 0..100 {
            assert!(s.decide_trade(&cfg, &c, &mut rng).is_none());
        }
    }

    #[test]
    fn accumulator_sizes_up_at_the_floor() {
        let mut s = BiasStrategy::accumulator();
        let mut rng = StdRng::seed_from_u64(6);
        let cfg = config(Personality::Accumulator);
        let c = ctx(dec!(95.3));

        // Variance is zeroed: plain orders are exactly 20 (avg 10 * 2.0),
        // boundary orders exactly 30.
        for _ in 0..100 {
            if let Some(d) = s.decide_trade(&cfg, &c, &mut rng) {
                match d.side {
                    OrderSide::Buy => {
                        assert_eq!(d.amount.inner(), dec!(30));
                        assert_eq!(d.purpose, TradePurpose::PricePush);
                    }
                    OrderSide::Sell => {
                        assert_eq!(d.amount.inner(), dec!(20));
                        assert_eq!(d.purpose, TradePurpose::Liquidity);
                    }
                }
            }
        }
    }

    #[test]
    fn distributor_sizes_up_at_the_ceiling() {
        let mut s = BiasStrategy::distributor();
        let mut rng = StdRng::seed_from_u64(7);
        let cfg = config(Personality::Distributor);
        let c = ctx(dec!(104.7));

        let mut boundary_sells = 0;
        for _ in 0..100 {
            if let Some(d) = s.decide_trade(&cfg, &c, &mut rng) {
                if d.side == OrderSide::Sell {
                    assert_eq!(d.amount.inner(), dec!(30));
                    boundary_sells += 1;
                }
            }
        }
        assert!(boundary_sells > 50, "boundary sells {boundary_sells}");
    }
}
