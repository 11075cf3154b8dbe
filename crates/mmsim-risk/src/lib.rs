//! Safety nets for the market simulator.
//!
//! [`CircuitBreaker`]: a per-market latch with a trip reason and lazy
//! auto-reset after a cooldown. [`LossProtection`]: daily per-market and
//! global loss accounting with a consecutive-loss stop.

pub mod circuit_breaker;
pub mod loss_protection;

pub use circuit_breaker::{CircuitBreaker, TripReason, DEFAULT_BREAKER_COOLDOWN_MS};
pub use loss_protection::{LossProtection, LossSnapshot, DEFAULT_MAX_CONSECUTIVE_LOSSES};
