//! Coordination rules applied to every bot decision.
//!
//! Rules run in sequence; each one either passes the decision through,
//! returns an adjusted copy, or rejects it. A rejection is a normal
//! outcome, not an error: the bot simply skips this round.

use mmsim_core::{BookTop, BotId, OrderSide, Price, TradeDecision};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pressure::{MarketPressure, TradeWindow};

/// Opposite-side lookback for collision detection.
pub const ANTI_COLLISION_WINDOW_MS: u64 = 5_000;

/// Maximum tolerated deviation from the current price, in percent.
pub const MAX_PRICE_DEVIATION_PCT: Decimal = dec!(1);

/// Net-pressure magnitude beyond which the book is considered imbalanced.
pub const IMBALANCE_THRESHOLD: Decimal = dec!(0.3);

/// Minimum gap a decision must keep from the touch, in basis points.
pub const MIN_BOOK_GAP_BPS: Decimal = dec!(10);

/// The coordination rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinationRule {
    AntiCollision,
    PriceCoordination,
    VolumeBalancing,
    SpreadMaintenance,
}

impl CoordinationRule {
    /// Default rule set, in application order.
    pub const DEFAULT_SET: [Self; 4] = [
        Self::AntiCollision,
        Self::PriceCoordination,
        Self::VolumeBalancing,
        Self::SpreadMaintenance,
    ];
}

impl std::fmt::Display for CoordinationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AntiCollision => write!(f, "ANTI_COLLISION"),
            Self::PriceCoordination => write!(f, "PRICE_COORDINATION"),
            Self::VolumeBalancing => write!(f, "VOLUME_BALANCING"),
            Self::SpreadMaintenance => write!(f, "SPREAD_MAINTENANCE"),
        }
    }
}

/// Market data a rule needs to judge a decision.
#[derive(Debug, Clone, Copy)]
pub struct CoordinationContext {
    pub current_price: Price,
    pub book_top: Option<BookTop>,
    pub now_ms: u64,
}

/// Result of applying one rule.
#[derive(Debug, Clone)]
pub enum RuleOutcome {
    Pass,
    Adjust(TradeDecision),
    Reject(String),
}

impl CoordinationRule {
    pub(crate) fn apply(
        &self,
        bot: BotId,
        decision: &TradeDecision,
        window: &TradeWindow,
        pressure: &MarketPressure,
        ctx: &CoordinationContext,
    ) -> RuleOutcome {
        match self {
            Self::AntiCollision => anti_collision(bot, decision, window, ctx),
            Self::PriceCoordination => price_coordination(decision, ctx),
            Self::VolumeBalancing => volume_balancing(decision, pressure),
            Self::SpreadMaintenance => spread_maintenance(decision, ctx),
        }
    }
}

/// Reject a decision that would fill against another bot's recent trade
/// on the opposite side.
fn anti_collision(
    bot: BotId,
    decision: &TradeDecision,
    window: &TradeWindow,
    ctx: &CoordinationContext,
) -> RuleOutcome {
    for trade in window.iter() {
        if trade.bot == bot {
            continue;
        }
        if ctx.now_ms.saturating_sub(trade.at_ms) > ANTI_COLLISION_WINDOW_MS {
            continue;
        }
        if trade.side != decision.side.opposite() {
            continue;
        }
        let would_cross = match decision.side {
            OrderSide::Buy => decision.price >= trade.price,
            OrderSide::Sell => decision.price <= trade.price,
        };
        if would_cross {
            return RuleOutcome::Reject(format!(
                "{} {} at {} crosses {}'s {} at {}",
                decision.side, decision.amount, decision.price, trade.bot, trade.side, trade.price
            ));
        }
    }
    RuleOutcome::Pass
}

/// Clamp a price that strays more than 1% from the current price back to
/// exactly 1% away on the same side.
fn price_coordination(decision: &TradeDecision, ctx: &CoordinationContext) -> RuleOutcome {
    if !ctx.current_price.is_positive() {
        return RuleOutcome::Pass;
    }
    let deviation_pct = match decision.price.pct_from(ctx.current_price) {
        Some(d) => d,
        None => return RuleOutcome::Pass,
    };
    if deviation_pct.abs() <= MAX_PRICE_DEVIATION_PCT {
        return RuleOutcome::Pass;
    }

    let limit = MAX_PRICE_DEVIATION_PCT / dec!(100);
    let factor = if deviation_pct > Decimal::ZERO {
        Decimal::ONE + limit
    } else {
        Decimal::ONE - limit
    };
    let mut adjusted = decision.clone();
    adjusted.price = Price::new(ctx.current_price.inner() * factor);
    debug!(
        proposed = %decision.price,
        clamped = %adjusted.price,
        deviation_pct = %deviation_pct.round_dp(4),
        "price coordination clamped decision"
    );
    RuleOutcome::Adjust(adjusted)
}

/// Halve the amount of a decision that would worsen an already
/// imbalanced market.
fn volume_balancing(decision: &TradeDecision, pressure: &MarketPressure) -> RuleOutcome {
    let worsens = match decision.side {
        OrderSide::Buy => pressure.buy_heavy(IMBALANCE_THRESHOLD),
        OrderSide::Sell => pressure.sell_heavy(IMBALANCE_THRESHOLD),
    };
    if !worsens {
        return RuleOutcome::Pass;
    }
    let mut adjusted = decision.clone();
    adjusted.amount = adjusted.amount.halved();
    debug!(
        side = %decision.side,
        net_pressure = %pressure.net_pressure.round_dp(4),
        original = %decision.amount,
        halved = %adjusted.amount,
        "volume balancing halved decision"
    );
    RuleOutcome::Adjust(adjusted)
}

/// Keep decisions at least [`MIN_BOOK_GAP_BPS`] away from the touch:
/// buys below the ask, sells above the bid. Clamps instead of rejecting.
fn spread_maintenance(decision: &TradeDecision, ctx: &CoordinationContext) -> RuleOutcome {
    let Some(top) = ctx.book_top else {
        return RuleOutcome::Pass;
    };
    match decision.side {
        OrderSide::Buy => {
            if !top.ask.is_positive() {
                return RuleOutcome::Pass;
            }
            let ceiling = top.ask.offset_bps(-MIN_BOOK_GAP_BPS);
            if decision.price <= ceiling {
                return RuleOutcome::Pass;
            }
            let mut adjusted = decision.clone();
            adjusted.price = ceiling;
            debug!(ask = %top.ask, clamped = %ceiling, "buy clamped below ask");
            RuleOutcome::Adjust(adjusted)
        }
        OrderSide::Sell => {
            if !top.bid.is_positive() {
                return RuleOutcome::Pass;
            }
            let floor = top.bid.offset_bps(MIN_BOOK_GAP_BPS);
            if decision.price >= floor {
                return RuleOutcome::Pass;
            }
            let mut adjusted = decision.clone();
            adjusted.price = floor;
            debug!(bid = %top.bid, clamped = %floor, "sell clamped above bid");
            RuleOutcome::Adjust(adjusted)
        }
    }
}
