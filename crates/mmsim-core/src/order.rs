//! Order primitives shared across the workspace.

use crate::decimal::Price;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[inline]
    #[must_use]
    pub fn is_buy(&self) -> bool {
        matches!(self, Self::Buy)
    }

    #[inline]
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Direction sign: +1 for buys, -1 for sells.
    #[inline]
    #[must_use]
    pub fn sign(&self) -> i32 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Unique order identifier.
///
/// UUID-backed, rendered with an `mm_` prefix so simulator orders are
/// recognizable in mixed logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mm_{}", self.0.simple())
    }
}

/// Whether an order touches the real book or stays internal.
///
/// The liquidity split sends only the `Real` portion of each trade
/// to the order book; the `AiOnly` remainder is recorded for price
/// formation but never rests as a fillable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    AiOnly,
    Real,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AiOnly => write!(f, "ai_only"),
            Self::Real => write!(f, "real"),
        }
    }
}

/// Best bid/ask snapshot of a market's book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookTop {
    pub bid: Price,
    pub ask: Price,
}

impl BookTop {
    #[must_use]
    pub fn new(bid: Price, ask: Price) -> Self {
        Self { bid, ask }
    }

    /// Midpoint of the book, `None` when either side is empty (zero).
    #[must_use]
    pub fn mid(&self) -> Option<Price> {
        if self.bid.is_zero() || self.ask.is_zero() {
            return None;
        }
        Some(self.bid.mid(self.ask))
    }

    /// Spread in basis points relative to the midpoint.
    #[must_use]
    pub fn spread_bps(&self) -> Option<rust_decimal::Decimal> {
        let mid = self.mid()?;
        self.ask.bps_from(mid).map(|half| half * rust_decimal::Decimal::TWO)
    }
}
