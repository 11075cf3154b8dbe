//! Randomized timing and sizing so populations do not move in lockstep.

use mmsim_core::Size;
use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;

/// Spreads cooldowns by a bounded random factor.
///
/// A bot that just traded becomes ready again after
/// `cooldown * U(1 - spread, 1 + spread)` instead of the exact configured
/// cooldown. Identical configs still trade at visibly different rhythms.
#[derive(Debug, Clone, Copy)]
pub struct TimingJitter {
    spread: f64,
}

impl TimingJitter {
    /// `spread` is a fraction of the base delay, clamped to `[0, 0.9]`.
    #[must_use]
    pub fn new(spread: f64) -> Self {
        Self {
            spread: spread.clamp(0.0, 0.9),
        }
    }

    #[must_use]
    pub fn next_delay_ms(&self, base_ms: u64, rng: &mut StdRng) -> u64 {
        if self.spread == 0.0 || base_ms == 0 {
            return base_ms;
        }
        let factor = rng.gen_range(1.0 - self.spread..=1.0 + self.spread);
        (base_ms as f64 * factor).round() as u64
    }
}

impl Default for TimingJitter {
    fn default() -> Self {
        Self::new(0.25)
    }
}

/// Draws order sizes around a configured average.
///
/// The drawn size is `avg * multiplier * (1 + variance * U(-1, 1))`,
/// rounded to 8 decimal places. Variance is capped upstream at 0.5 so the
/// result can never reach zero.
pub struct SizeGenerator;

impl SizeGenerator {
    #[must_use]
    pub fn sample(avg: Size, multiplier: Decimal, variance: Decimal, rng: &mut StdRng) -> Size {
        let base = avg.scaled(multiplier);
        if variance.is_zero() {
            return Size::new(base.inner().round_dp(8));
        }
        let u = rng.gen_range(-1.0..=1.0);
        let jitter =
            Decimal::ONE + variance * Decimal::from_f64_retain(u).unwrap_or(Decimal::ZERO);
        let drawn = base.scaled(jitter);
        let size = Size::new(drawn.inner().round_dp(8));
        if size.is_positive() {
            size
        } else {
            base
        }
    }
}
