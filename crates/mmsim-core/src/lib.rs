//! Core domain types for the mmsim market-making simulation engine.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`, `Size`: precision-safe decimal types
//! - `MarketId`, `MarketConfig`: market identity and per-market settings
//! - `BotId`, `BotConfig`, `Personality`: agent identity and trading profile
//! - `TradeDecision`: the output of a strategy for one tick
//! - `Clock`: injectable time source for deterministic tests

pub mod bot;
pub mod clock;
pub mod decimal;
pub mod decision;
pub mod error;
pub mod market;
pub mod order;

pub use bot::{BotConfig, BotId, BotStatus, Personality, TradeFrequency};
pub use clock::{day_number, Clock, ManualClock, SharedClock, SystemClock};
pub use decimal::{Price, Size};
pub use decision::{TradeDecision, TradePurpose};
pub use error::{CoreError, Result};
pub use market::{
    AggressionLevel, MarketConfig, MarketId, MarketStatus, PoolBalances,
};
pub use order::{BookTop, OrderId, OrderKind, OrderSide};
