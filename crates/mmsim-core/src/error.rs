//! Error types for mmsim-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid market config: {0}")]
    InvalidMarketConfig(String),

    #[error("Invalid bot config: {0}")]
    InvalidBotConfig(String),

    #[error("Invalid trade decision: {0}")]
    InvalidDecision(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
