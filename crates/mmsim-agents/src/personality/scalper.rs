//! Scalper: frequent micro-trades that fade the last move.

use crate::context::MarketContext;
use crate::strategy::{confidence, Strategy};
use mmsim_core::{BotConfig, OrderSide, Personality, TradeDecision, TradePurpose};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Book wider than this is too expensive to scalp.
const MAX_SPREAD_BPS: Decimal = dec!(20);
/// Volatility above this means the tape is moving too fast.
const MAX_VOLATILITY_PCT: Decimal = dec!(3);
/// Chance to sit a round out even when conditions are fine.
const SKIP_PROBABILITY: f64 = 0.4;
/// Quote offset from the current price (3 bps = 0.03%).
const QUOTE_OFFSET_BPS: Decimal = dec!(3);

/// Fades the most recent micro-move: sells after an up-tick, buys after a
/// down-tick, flips a coin on a flat tape. Stateless apart from the RNG.
#[derive(Debug, Default)]
pub struct ScalperStrategy;

impl ScalperStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for ScalperStrategy {
    fn personality(&self) -> Personality {
        Personality::Scalper
    }

    fn decide_trade(
        &mut self,
        config: &BotConfig,
        ctx: &MarketContext,
        rng: &mut StdRng,
    ) -> Option<TradeDecision> {
        if let Some(spread) = ctx.spread_bps() {
            if spread > MAX_SPREAD_BPS {
                return None;
            }
        }
        if ctx.volatility_pct > MAX_VOLATILITY_PCT {
            return None;
        }
        if rng.gen_bool(SKIP_PROBABILITY) {
            return None;
        }

        let micro = ctx.micro_change_pct;
        let side = if micro > Decimal::ZERO {
            OrderSide::Sell
        } else if micro < Decimal::ZERO {
            OrderSide::Buy
        } else if rng.gen_bool(0.5) {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };

        let offset = match side {
            OrderSide::Buy => -QUOTE_OFFSET_BPS,
            OrderSide::Sell => QUOTE_OFFSET_BPS,
        };
        let price = ctx.clamp(ctx.current_price.offset_bps(offset));
        let amount = self.order_size(config, ctx, rng);
        let reason = if micro.is_zero() {
            "scalping a flat tape".to_string()
        } else {
            format!("fading a {micro:.3}% tick")
        };

        TradeDecision::new(
            side,
            price,
            amount,
            TradePurpose::Liquidity,
            confidence(0.45, micro * dec!(10)),
            reason,
        )
        .ok()
    }
}
