//! Engine error types.

use crate::market_instance::LifecycleState;
use mmsim_core::MarketId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("market {0} not found")]
    MarketNotFound(MarketId),

    #[error("market {0} already registered")]
    DuplicateMarket(MarketId),

    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error(transparent)]
    Config(#[from] mmsim_core::CoreError),

    #[error("config store: {0}")]
    Store(String),

    #[error("order book: {0}")]
    Book(String),

    #[error("trade history: {0}")]
    History(String),

    #[error("event sink: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
