//! Market identification and configuration types.
//!
//! A market is a simulated trading pair driven around a configured target
//! price. The engine holds a mutable copy of [`MarketConfig`] per market;
//! each tick works on an immutable snapshot of it.

use crate::bot::{BotConfig, BotStatus};
use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique market identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(pub u64);

impl MarketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mkt-{}", self.0)
    }
}

/// Administrative market status from configuration.
///
/// Distinct from the engine's runtime state machine: this is what the
/// operator configured, not what the tick loop is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Active,
    Paused,
    Stopped,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// How hard the simulator pushes the price around.
///
/// Controls both the oscillation amplitude and the per-tick probability
/// that a simulated trade happens at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggressionLevel {
    Conservative,
    Moderate,
    Aggressive,
}

impl AggressionLevel {
    /// Oscillation amplitude as a percentage of target price.
    pub fn amplitude_pct(&self) -> Decimal {
        match self {
            Self::Conservative => dec!(0.15),
            Self::Moderate => dec!(0.30),
            Self::Aggressive => dec!(0.50),
        }
    }

    /// Per-tick probability that the market attempts a simulated trade.
    pub fn trade_probability(&self) -> f64 {
        match self {
            Self::Conservative => 0.05,
            Self::Moderate => 0.15,
            Self::Aggressive => 0.30,
        }
    }
}

impl fmt::Display for AggressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conservative => write!(f, "CONSERVATIVE"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Aggressive => write!(f, "AGGRESSIVE"),
        }
    }
}

/// Liquidity pool backing a market's real-order flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBalances {
    pub base_balance: Size,
    pub quote_balance: Decimal,
    pub tvl: Decimal,
}

impl PoolBalances {
    pub fn new(base_balance: Size, quote_balance: Decimal, tvl: Decimal) -> Self {
        Self {
            base_balance,
            quote_balance,
            tvl,
        }
    }

    /// Both legs must hold a positive balance before real orders go out.
    #[must_use]
    pub fn is_funded(&self) -> bool {
        self.base_balance.is_positive() && self.quote_balance > Decimal::ZERO
    }
}

/// Per-market configuration snapshot.
///
/// Loaded from the config store, replaced wholesale by `update_config`
/// without interrupting an in-flight tick. `current_daily_volume` is the
/// only field the engine itself advances between reloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: MarketId,
    pub symbol: String,
    pub status: MarketStatus,
    pub target_price: Price,
    pub price_range_low: Price,
    pub price_range_high: Price,
    pub aggression: AggressionLevel,
    /// Daily volume cap in base units. Zero means uncapped.
    pub max_daily_volume: Decimal,
    pub current_daily_volume: Decimal,
    /// Volatility (percent) above which trading pauses when
    /// `pause_on_high_volatility` is set.
    pub volatility_threshold: Decimal,
    pub pause_on_high_volatility: bool,
    /// Share of each trade placed on the real book, in percent [0, 100].
    pub real_liquidity_percent: Decimal,
    pub pool: Option<PoolBalances>,
    pub bots: Vec<BotConfig>,
}

impl MarketConfig {
    /// Validate invariants required before the engine accepts the config.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: empty symbol",
                self.id
            )));
        }
        if !self.target_price.is_positive() {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: target price must be positive, got {}",
                self.id, self.target_price
            )));
        }
        if !(self.price_range_low < self.target_price && self.target_price < self.price_range_high)
        {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: price range must satisfy low < target < high, got [{}, {}] around {}",
                self.id, self.price_range_low, self.price_range_high, self.target_price
            )));
        }
        if !self.price_range_low.is_positive() {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: range low must be positive, got {}",
                self.id, self.price_range_low
            )));
        }
        if self.real_liquidity_percent < Decimal::ZERO
            || self.real_liquidity_percent > dec!(100)
        {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: real liquidity percent must be in [0, 100], got {}",
                self.id, self.real_liquidity_percent
            )));
        }
        if self.real_liquidity_percent > Decimal::ZERO && self.pool.is_none() {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: real liquidity requires a pool",
                self.id
            )));
        }
        if self.max_daily_volume < Decimal::ZERO {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: max daily volume must be non-negative, got {}",
                self.id, self.max_daily_volume
            )));
        }
        if self.volatility_threshold < Decimal::ZERO {
            return Err(CoreError::InvalidMarketConfig(format!(
                "{}: volatility threshold must be non-negative, got {}",
                self.id, self.volatility_threshold
            )));
        }
        for bot in &self.bots {
            bot.validate()?;
        }
        Ok(())
    }

    /// Number of bots currently eligible to trade.
    #[must_use]
    pub fn active_bot_count(&self) -> usize {
        self.bots
            .iter()
            .filter(|b| b.status == BotStatus::Active)
            .count()
    }

    /// Whether the daily volume cap has been reached. Zero cap = uncapped.
    #[must_use]
    pub fn volume_cap_reached(&self) -> bool {
        !self.max_daily_volume.is_zero() && self.current_daily_volume >= self.max_daily_volume
    }
}
