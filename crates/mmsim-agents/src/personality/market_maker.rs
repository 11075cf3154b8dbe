//! Market maker: alternating two-sided quotes with inventory control.

use crate::context::MarketContext;
use crate::strategy::Strategy;
use mmsim_core::{BotConfig, OrderSide, Personality, Price, Size, TradeDecision, TradePurpose};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Inventory ratio past which quoting stops and unwinding starts.
const IMBALANCE_LIMIT: Decimal = dec!(0.3);
/// Inventory capacity, expressed in average orders.
const CAPACITY_ORDERS: Decimal = dec!(10);
/// Unwind orders are scaled up to work the inventory off faster.
const REBALANCE_SCALE: Decimal = dec!(1.5);
/// Unwind quotes sit one basis point off the current price.
const REBALANCE_OFFSET_BPS: Decimal = dec!(1);

/// Quotes bid and ask alternately around the preferred spread while net
/// inventory stays inside the imbalance limit; beyond it, every round
/// unwinds the heavy side until the book is balanced again.
///
/// Net inventory moves only on [`Strategy::on_fill`], so coordinator
/// rejections do not drift the book.
#[derive(Debug, Default)]
pub struct MarketMakerStrategy {
    /// Signed base inventory: buys add, sells subtract.
    net_size: Decimal,
    last_quote: Option<OrderSide>,
}

impl MarketMakerStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Net inventory over capacity, clamped to [-1, 1].
    fn inventory_ratio(&self, config: &BotConfig) -> Decimal {
        let capacity = config.avg_order_size.inner() * CAPACITY_ORDERS;
        if capacity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.net_size / capacity).clamp(dec!(-1), dec!(1))
    }

    #[cfg(test)]
    fn net_size(&self) -> Decimal {
        self.net_size
    }
}

impl Strategy for MarketMakerStrategy {
    fn personality(&self) -> Personality {
        Personality::MarketMaker
    }

    fn decide_trade(
        &mut self,
        config: &BotConfig,
        ctx: &MarketContext,
        rng: &mut StdRng,
    ) -> Option<TradeDecision> {
        let ratio = self.inventory_ratio(config);
        if ratio.abs() > IMBALANCE_LIMIT {
            let side = if ratio > Decimal::ZERO {
                OrderSide::Sell
            } else {
                OrderSide::Buy
            };
            let offset = match side {
                OrderSide::Buy => -REBALANCE_OFFSET_BPS,
                OrderSide::Sell => REBALANCE_OFFSET_BPS,
            };
            let price = ctx.clamp(ctx.current_price.offset_bps(offset));
            let amount = self.order_size(config, ctx, rng).scaled(REBALANCE_SCALE);
            self.last_quote = Some(side);
            return TradeDecision::new(
                side,
                price,
                amount,
                TradePurpose::Liquidity,
                0.85,
                format!("unwinding inventory, ratio {ratio:.2}"),
            )
            .ok();
        }

        let side = match self.last_quote {
            Some(OrderSide::Buy) => OrderSide::Sell,
            Some(OrderSide::Sell) => OrderSide::Buy,
            None => {
                if rng.gen_bool(0.5) {
                    OrderSide::Buy
                } else {
                    OrderSide::Sell
                }
            }
        };
        self.last_quote = Some(side);

        let price = self.quote_price(config, ctx, side, rng);
        let amount = self.order_size(config, ctx, rng);
        let reason = match side {
            OrderSide::Buy => "refreshing the bid",
            OrderSide::Sell => "refreshing the ask",
        };
        TradeDecision::new(
            side,
            price,
            amount,
            TradePurpose::SpreadMaintenance,
            0.7,
            reason,
        )
        .ok()
    }

    fn on_fill(
        &mut self,
        side: OrderSide,
        _price: Price,
        amount: Size,
        _now_ms: u64,
        _rng: &mut StdRng,
    ) {
        match side {
            OrderSide::Buy => self.net_size += amount.inner(),
            OrderSide::Sell => self.net_size -= amount.inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmsim_core::{BotId, MarketId};
    use rand::SeedableRng;

    fn ctx() -> MarketContext {
        MarketContext {
            market_id: MarketId(1),
            current_price: Price::new(dec!(100)),
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

    fn config() -> BotConfig {
        BotConfig::sample(BotId::generate(), Personality::MarketMaker)
    }

    #[test]
    fn alternates_sides_when_balanced() {
        let mut s = MarketMakerStrategy::new();
        let mut rng = StdRng::seed_from_u64(1);
        let cfg = config();
        let c = ctx();

        let mut last: Option<OrderSide> = None;
        for _ in 0..20 {
            let d = s.decide_trade(&cfg, &c, &mut rng).unwrap();
            assert_eq!(d.purpose, TradePurpose::SpreadMaintenance);
            if let Some(prev) = last {
                assert_eq!(d.side, prev.opposite());
            }
            last = Some(d.side);
        }
    }

    #[test]
    fn quotes_straddle_the_current_price() {
        let mut s = MarketMakerStrategy::new();
        let mut rng = StdRng::seed_from_u64(2);
        let cfg = config();
        let c = ctx();

        for _ in 0..50 {
            let d = s.decide_trade(&cfg, &c, &mut rng).unwrap();
            match d.side {
                OrderSide::Buy => assert!(d.price < c.current_price),
                OrderSide::Sell => assert!(d.price > c.current_price),
            }
        }
    }

    #[test]
    fn long_inventory_forces_a_sell() {
        let mut s = MarketMakerStrategy::new();
        let mut rng = StdRng::seed_from_u64(3);
        let cfg = config();
        let c = ctx();

        // avg order 10 -> capacity 100; net 35 -> ratio 0.35 over the limit.
        s.on_fill(
            OrderSide::Buy,
            Price::new(dec!(100)),
            Size::new(dec!(35)),
            0,
            &mut rng,
        );

        let d = s.decide_trade(&cfg, &c, &mut rng).unwrap();
        assert_eq!(d.side, OrderSide::Sell);
        assert_eq!(d.purpose, TradePurpose::Liquidity);
        assert!(d.reason.contains("unwinding"));
        // Scaled 1.5x over the usual [8, 12] band.
        assert!(d.amount.inner() >= dec!(12));
    }

    #[test]
    fn short_inventory_forces_a_buy() {
        let mut s = MarketMakerStrategy::new();
        let mut rng = StdRng::seed_from_u64(4);
        let cfg = config();
        let c = ctx();

        s.on_fill(
            OrderSide::Sell,
            Price::new(dec!(100)),
            Size::new(dec!(40)),
            0,
            &mut rng,
        );

        let d = s.decide_trade(&cfg, &c, &mut rng).unwrap();
        assert_eq!(d.side, OrderSide::Buy);
    }

    #[test]
    fn fills_move_net_inventory_both_ways() {
        let mut s = MarketMakerStrategy::new();
        let mut rng = StdRng::seed_from_u64(5);

        s.on_fill(
            OrderSide::Buy,
            Price::new(dec!(100)),
            Size::new(dec!(5)),
            0,
            &mut rng,
        );
        s.on_fill(
            OrderSide::Sell,
            Price::new(dec!(100)),
            Size::new(dec!(3)),
            0,
            &mut rng,
        );
        assert_eq!(s.net_size(), dec!(2));
    }

    #[test]
    fn unwinding_stops_once_balanced() {
        let mut s = MarketMakerStrategy::new();
        let mut rng = StdRng::seed_from_u64(6);
        let cfg = config();
        let c = ctx();

        s.on_fill(
            OrderSide::Buy,
            Price::new(dec!(100)),
            Size::new(dec!(35)),
            0,
            &mut rng,
        );
        s.on_fill(
            OrderSide::Sell,
            Price::new(dec!(100)),
            Size::new(dec!(20)),
            0,
            &mut rng,
        );

        // Net 15 -> ratio 0.15, back under the limit: normal quoting.
        let d = s.decide_trade(&cfg, &c, &mut rng).unwrap();
        assert_eq!(d.purpose, TradePurpose::SpreadMaintenance);
    }
}
