//! Circuit breaker latch with timed auto-reset.
//!
//! Once tripped, the breaker blocks trading for a cooldown period
//! (default 30 minutes). The reset check happens lazily inside
//! [`CircuitBreaker::is_tripped`], so no background timer is needed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

/// Default cooldown before an automatic reset: 30 minutes.
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 30 * 60 * 1000;

// ============================================================================
// TripReason
// ============================================================================

/// Why the breaker tripped.
#[derive(Debug, Clone, PartialEq)]
pub enum TripReason {
    /// Volatility exceeded the configured threshold.
    HighVolatility { volatility_pct: Decimal },
    /// Too many consecutive losing trades.
    ConsecutiveLosses { count: u32 },
    /// Daily loss limit breached.
    DailyLossLimit { loss: Decimal },
    /// Manual trip by operator.
    Manual { message: String },
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighVolatility { volatility_pct } => {
                write!(f, "High volatility: {volatility_pct}%")
            }
            Self::ConsecutiveLosses { count } => write!(f, "Consecutive losses: {count}"),
            Self::DailyLossLimit { loss } => write!(f, "Daily loss limit: {loss}"),
            Self::Manual { message } => write!(f, "Manual: {message}"),
        }
    }
}

// ============================================================================
// CircuitBreaker
// ============================================================================

/// Tripped/untripped latch with a reason and timed auto-reset.
///
/// Thread-safe; share via `Arc<CircuitBreaker>`. All time arguments are
/// millisecond timestamps from the caller's clock, so tests drive the
/// cooldown without waiting.
pub struct CircuitBreaker {
    tripped: AtomicBool,
    tripped_at_ms: AtomicU64,
    reason: RwLock<Option<TripReason>>,
    cooldown_ms: u64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_BREAKER_COOLDOWN_MS)
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            tripped: AtomicBool::new(false),
            tripped_at_ms: AtomicU64::new(0),
            reason: RwLock::new(None),
            cooldown_ms,
        }
    }

    /// Whether trading is currently blocked.
    ///
    /// Performs the auto-reset check: a breaker whose cooldown has
    /// elapsed resets itself on this read and reports untripped.
    #[must_use]
    pub fn is_tripped(&self, now_ms: u64) -> bool {
        if !self.tripped.load(Ordering::SeqCst) {
            return false;
        }
        let tripped_at = self.tripped_at_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(tripped_at) >= self.cooldown_ms {
            self.clear();
            info!(cooldown_ms = self.cooldown_ms, "circuit breaker auto-reset");
            return false;
        }
        true
    }

    /// Trip the breaker. A second trip while tripped keeps the original
    /// reason and timestamp.
    pub fn trip(&self, reason: TripReason, now_ms: u64) {
        if self
            .tripped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.tripped_at_ms.store(now_ms, Ordering::SeqCst);
            {
                let mut guard = self.reason.write();
                *guard = Some(reason.clone());
            }
            error!(reason = %reason, "CIRCUIT BREAKER TRIPPED");
        } else {
            warn!(new_reason = %reason, "circuit breaker already tripped, keeping original reason");
        }
    }

    /// Manual reset, regardless of remaining cooldown.
    pub fn reset(&self) {
        if self.tripped.load(Ordering::SeqCst) {
            let previous = self.reason.read().clone();
            self.clear();
            info!(previous_reason = ?previous, "circuit breaker manually reset");
        }
    }

    fn clear(&self) {
        self.tripped.store(false, Ordering::SeqCst);
        self.tripped_at_ms.store(0, Ordering::SeqCst);
        let mut guard = self.reason.write();
        *guard = None;
    }

    /// Trip reason, `None` when untripped. Does not run the auto-reset
    /// check; pair with [`Self::is_tripped`] for gating.
    #[must_use]
    pub fn reason(&self) -> Option<TripReason> {
        if self.tripped.load(Ordering::SeqCst) {
            self.reason.read().clone()
        } else {
            None
        }
    }

    /// Timestamp of the active trip, `None` when untripped.
    #[must_use]
    pub fn tripped_at_ms(&self) -> Option<u64> {
        if self.tripped.load(Ordering::SeqCst) {
            Some(self.tripped_at_ms.load(Ordering::SeqCst))
        } else {
            None
        }
    }
}
