//! Trade decisions produced by strategies and the market oscillator.
//!
//! A decision is ephemeral: it lives for one tick, may be adjusted or
//! rejected by coordination rules, and is never persisted by the core.
//! "No trade this tick" is expressed as `Option::None`, not as a flag
//! inside the decision.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use crate::order::OrderSide;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a trade is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradePurpose {
    /// Move the price toward the oscillation target.
    PricePush,
    /// Provide volume without a directional goal.
    Liquidity,
    /// Keep the quoted spread tight.
    SpreadMaintenance,
    /// Add noise so the tape does not look mechanical.
    Volatility,
}

impl fmt::Display for TradePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PricePush => write!(f, "PRICE_PUSH"),
            Self::Liquidity => write!(f, "LIQUIDITY"),
            Self::SpreadMaintenance => write!(f, "SPREAD_MAINTENANCE"),
            Self::Volatility => write!(f, "VOLATILITY"),
        }
    }
}

/// A concrete intent to trade, produced once per tick/round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
    pub purpose: TradePurpose,
    /// Strategy's confidence in this decision, clamped to [0, 1].
    pub confidence: f64,
    /// Human-readable rationale, for logs and activity feeds.
    pub reason: String,
}

impl TradeDecision {
    /// Build a decision, rejecting non-positive price or amount.
    ///
    /// Confidence out of [0, 1] is clamped rather than rejected.
    pub fn new(
        side: OrderSide,
        price: Price,
        amount: Size,
        purpose: TradePurpose,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Result<Self> {
        if !price.is_positive() {
            return Err(CoreError::InvalidDecision(format!(
                "price must be positive, got {price}"
            )));
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidDecision(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(Self {
            side,
            price,
            amount,
            purpose,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
        })
    }

    /// Notional value of the decision (amount * price).
    #[must_use]
    pub fn notional(&self) -> rust_decimal::Decimal {
        self.amount.notional(self.price)
    }
}

impl fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} ({}, conf {:.2})",
            self.side, self.amount, self.price, self.purpose, self.confidence
        )
    }
}
