//! Cross-bot coordination for mmsim.
//!
//! Every bot decision passes through the [`BotCoordinator`] before
//! execution. Active rules can reject a decision outright or return an
//! adjusted copy that is threaded into the remaining rules. The
//! coordinator also maintains per-market [`MarketPressure`] from a
//! rolling window of recently executed trades.

pub mod coordinator;
pub mod pressure;
pub mod rules;

pub use coordinator::{BotCoordinator, Coordination, CoordinationContext};
pub use pressure::{MarketPressure, RecordedTrade, TradeWindow, DEFAULT_RETENTION_MS};
pub use rules::{CoordinationRule, IMBALANCE_THRESHOLD};
