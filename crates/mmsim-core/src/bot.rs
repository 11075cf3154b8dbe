//! Bot (agent) identity and configuration.
//!
//! Each market owns a population of bots. A bot's config carries its
//! personality, sizing parameters and daily limits; the trading behavior
//! itself lives in the strategy layer.

use crate::decimal::Size;
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique bot identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotId(Uuid);

impl BotId {
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

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bot_{}", self.0.simple())
    }
}

/// Trading personality variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Personality {
    Scalper,
    Swing,
    Accumulator,
    Distributor,
    MarketMaker,
}

impl Personality {
    pub const ALL: [Self; 5] = [
        Self::Scalper,
        Self::Swing,
        Self::Accumulator,
        Self::Distributor,
        Self::MarketMaker,
    ];

    /// Baseline cooldown between trades for this personality.
    pub fn base_cooldown_ms(&self) -> u64 {
        match self {
            Self::Scalper => 10_000,
            Self::Swing => 60_000,
            Self::Accumulator | Self::Distributor => 120_000,
            Self::MarketMaker => 5_000,
        }
    }

    /// Order-size multiplier applied on top of `avg_order_size`.
    ///
    /// Scalpers trade small and often; accumulation/distribution
    /// campaigns trade in larger clips.
    pub fn size_multiplier(&self) -> Decimal {
        match self {
            Self::Scalper => dec!(0.5),
            Self::Swing => dec!(1.5),
            Self::Accumulator | Self::Distributor => dec!(2.0),
            Self::MarketMaker => dec!(1.0),
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalper => write!(f, "SCALPER"),
            Self::Swing => write!(f, "SWING"),
            Self::Accumulator => write!(f, "ACCUMULATOR"),
            Self::Distributor => write!(f, "DISTRIBUTOR"),
            Self::MarketMaker => write!(f, "MARKET_MAKER"),
        }
    }
}

/// How often a bot wants to act, scaling the personality cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeFrequency {
    High,
    Medium,
    Low,
}

impl TradeFrequency {
    /// Scale the personality's base cooldown by this frequency.
    pub fn scale_ms(&self, base_ms: u64) -> u64 {
        match self {
            Self::High => base_ms / 2,
            Self::Medium => base_ms,
            Self::Low => base_ms * 2,
        }
    }
}

/// Bot lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BotStatus {
    Active,
    Paused,
    Cooldown,
}

/// Configuration and per-day counters for one bot.
///
/// Owned exclusively by the agent group of its market; only the bot's own
/// execution path mutates the counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    pub id: BotId,
    pub name: String,
    pub personality: Personality,
    /// Risk appetite in [0, 1]; scales how far quotes stray from mid.
    pub risk_tolerance: Decimal,
    pub trade_frequency: TradeFrequency,
    pub avg_order_size: Size,
    /// Relative jitter applied to order size, in [0, 0.5].
    pub order_size_variance: Decimal,
    /// Preferred quoting distance in basis points.
    pub preferred_spread_bps: Decimal,
    pub status: BotStatus,
    pub daily_trade_count: u32,
    pub max_daily_trades: u32,
    pub last_trade_at_ms: Option<u64>,
}

impl BotConfig {
    /// Baseline config for a personality, used by the factory and tests.
    pub fn sample(id: BotId, personality: Personality) -> Self {
        let (risk, frequency, spread_bps, max_trades) = match personality {
            Personality::Scalper => (dec!(0.7), TradeFrequency::High, dec!(5), 500),
            Personality::Swing => (dec!(0.5), TradeFrequency::Medium, dec!(30), 50),
            Personality::Accumulator => (dec!(0.4), TradeFrequency::Low, dec!(50), 30),
            Personality::Distributor => (dec!(0.4), TradeFrequency::Low, dec!(50), 30),
            Personality::MarketMaker => (dec!(0.6), TradeFrequency::High, dec!(15), 1000),
        };
        Self {
            id,
            name: format!("{}-{}", personality, id).to_lowercase(),
            personality,
            risk_tolerance: risk,
            trade_frequency: frequency,
            avg_order_size: Size::new(dec!(10)),
            order_size_variance: dec!(0.2),
            preferred_spread_bps: spread_bps,
            status: BotStatus::Active,
            daily_trade_count: 0,
            max_daily_trades: max_trades,
            last_trade_at_ms: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CoreError::InvalidBotConfig(format!(
                "{}: empty name",
                self.id
            )));
        }
        if self.risk_tolerance < Decimal::ZERO || self.risk_tolerance > Decimal::ONE {
            return Err(CoreError::InvalidBotConfig(format!(
                "{}: risk tolerance must be in [0, 1], got {}",
                self.id, self.risk_tolerance
            )));
        }
        if !self.avg_order_size.is_positive() {
            return Err(CoreError::InvalidBotConfig(format!(
                "{}: avg order size must be positive, got {}",
                self.id, self.avg_order_size
            )));
        }
        if self.order_size_variance < Decimal::ZERO || self.order_size_variance > dec!(0.5) {
            return Err(CoreError::InvalidBotConfig(format!(
                "{}: order size variance must be in [0, 0.5], got {}",
                self.id, self.order_size_variance
            )));
        }
        if self.preferred_spread_bps < Decimal::ZERO {
            return Err(CoreError::InvalidBotConfig(format!(
                "{}: preferred spread must be non-negative, got {}",
                self.id, self.preferred_spread_bps
            )));
        }
        if self.max_daily_trades == 0 {
            return Err(CoreError::InvalidBotConfig(format!(
                "{}: max daily trades must be at least 1",
                self.id
            )));
        }
        Ok(())
    }

    /// Effective cooldown: personality baseline scaled by frequency.
    #[must_use]
    pub fn cooldown_ms(&self) -> u64 {
        self.trade_frequency
            .scale_ms(self.personality.base_cooldown_ms())
    }

    /// Whether this bot may trade right now.
    ///
    /// Gate order: status, daily cap, cooldown.
    #[must_use]
    pub fn can_trade(&self, now_ms: u64) -> bool {
        if self.status != BotStatus::Active {
            return false;
        }
        if self.daily_trade_count >= self.max_daily_trades {
            return false;
        }
        match self.last_trade_at_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.cooldown_ms(),
            None => true,
        }
    }

    /// Advance counters after a successful trade.
    pub fn record_trade(&mut self, now_ms: u64) {
        self.daily_trade_count = self.daily_trade_count.saturating_add(1);
        self.last_trade_at_ms = Some(now_ms);
    }

    /// Calendar-day rollover: daily counters start fresh.
    pub fn reset_daily(&mut self) {
        self.daily_trade_count = 0;
    }
}
