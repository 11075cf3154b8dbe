//! Error types for mmsim-price.

use thiserror::Error;

/// Price feed error types.
///
/// `SymbolUnsupported` is a terminal condition for a symbol (the tracker
/// memoizes it and stops calling the feed); everything else is transient
/// and degrades to the last known price.
#[derive(Debug, Clone, Error)]
pub enum PriceError {
    #[error("symbol not supported by feed: {0}")]
    SymbolUnsupported(String),

    #[error("feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("malformed ticker payload: {0}")]
    MalformedPayload(String),
}

impl PriceError {
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::SymbolUnsupported(_))
    }
}

/// Result type alias for price operations.
pub type Result<T> = std::result::Result<T, PriceError>;
