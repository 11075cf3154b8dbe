//! Swing trader: position cycles off the range boundaries.

use crate::context::MarketContext;
use crate::strategy::Strategy;
use mmsim_core::{BotConfig, OrderSide, Personality, Price, Size, TradeDecision, TradePurpose};
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Band around the range boundaries where entries are considered.
const ENTRY_BAND_PCT: Decimal = dec!(1);
/// Chance to keep waiting even with an entry setup in front of us.
const WAIT_PROBABILITY: f64 = 0.6;
/// Longest a position is held before it is unwound regardless of price.
const MAX_HOLD_MS: u64 = 10 * 60 * 1_000;
/// Window change against the position that forces an exit.
const REVERSAL_PCT: Decimal = dec!(1);

#[derive(Debug, Clone, Copy)]
struct OpenPosition {
    entry: Price,
    amount: Size,
    opened_at_ms: u64,
    /// Profit target in percent, drawn at fill time.
    target_pct: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
enum PositionState {
    #[default]
    Neutral,
    Long(OpenPosition),
    Short(OpenPosition),
}

/// Buys near range support, sells near range resistance, and holds the
/// position until a profit target, a hold timeout, or a trend reversal.
///
/// The position only changes in [`Strategy::on_fill`]: a proposed entry
/// that the coordinator rejects leaves the strategy flat.
#[derive(Debug, Default)]
pub struct SwingStrategy {
    position: PositionState,
}

impl SwingStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn try_enter(
        &self,
        config: &BotConfig,
        ctx: &MarketContext,
        rng: &mut StdRng,
    ) -> Option<TradeDecision> {
        let (side, reason) = if ctx.near_low(ENTRY_BAND_PCT) {
            (OrderSide::Buy, "entering long off range support")
        } else if ctx.near_high(ENTRY_BAND_PCT) {
            (OrderSide::Sell, "entering short off range resistance")
        } else {
            return None;
        };
        if rng.gen_bool(WAIT_PROBABILITY) {
            return None;
        }

        let price = self.quote_price(config, ctx, side, rng);
        let amount = self.order_size(config, ctx, rng);
        TradeDecision::new(side, price, amount, TradePurpose::Volatility, 0.6, reason).ok()
    }

    fn try_exit(
        &self,
        config: &BotConfig,
        ctx: &MarketContext,
        pos: OpenPosition,
        exit_side: OrderSide,
        rng: &mut StdRng,
    ) -> Option<TradeDecision> {
        let gain_pct = match exit_side {
            // Long positions exit by selling, so gain is price over entry.
            OrderSide::Sell => ctx.current_price.pct_from(pos.entry)?,
            OrderSide::Buy => pos.entry.pct_from(ctx.current_price)?,
        };
        let reversed = match exit_side {
            OrderSide::Sell => ctx.change_pct <= -REVERSAL_PCT,
            OrderSide::Buy => ctx.change_pct >= REVERSAL_PCT,
        };

        let (reason, conf) = if gain_pct >= pos.target_pct {
            (format!("taking {gain_pct:.2}% off a swing position"), 0.8)
        } else if ctx.now_ms.saturating_sub(pos.opened_at_ms) >= MAX_HOLD_MS {
            ("unwinding a stale swing position".to_string(), 0.6)
        } else if reversed {
            ("cutting a swing position on trend reversal".to_string(), 0.6)
        } else {
            return None;
        };

        let price = self.quote_price(config, ctx, exit_side, rng);
        TradeDecision::new(
            exit_side,
            price,
            pos.amount,
            TradePurpose::Volatility,
            conf,
            reason,
        )
        .ok()
    }
}

impl Strategy for SwingStrategy {
    fn personality(&self) -> Personality {
        Personality::Swing
    }

    fn decide_trade(
        &mut self,
        config: &BotConfig,
        ctx: &MarketContext,
        rng: &mut StdRng,
    ) -> Option<TradeDecision> {
        match self.position {
            PositionState::Neutral => self.try_enter(config, ctx, rng),
            PositionState::Long(pos) => self.try_exit(config, ctx, pos, OrderSide::Sell, rng),
            PositionState::Short(pos) => self.try_exit(config, ctx, pos, OrderSide::Buy, rng),
        }
    }

    fn on_fill(
        &mut self,
        side: OrderSide,
        price: Price,
        amount: Size,
        now_ms: u64,
        rng: &mut StdRng,
    ) {
        self.position = match (self.position, side) {
            (PositionState::Neutral, _) => {
                let opened = OpenPosition {
                    entry: price,
                    amount,
                    opened_at_ms: now_ms,
                    target_pct: draw_target_pct(rng),
                };
                match side {
                    OrderSide::Buy => PositionState::Long(opened),
                    OrderSide::Sell => PositionState::Short(opened),
                }
            }
            (PositionState::Long(_), OrderSide::Sell) => PositionState::Neutral,
            (PositionState::Short(_), OrderSide::Buy) => PositionState::Neutral,
            (state, _) => state,
        };
    }
}

/// Profit target drawn uniformly from [0.5%, 3%].
fn draw_target_pct(rng: &mut StdRng) -> Decimal {
    Decimal::from_f64_retain(rng.gen_range(0.5..=3.0))
        .unwrap_or(dec!(1))
        .round_dp(2)
}
