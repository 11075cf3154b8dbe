//! AI-only vs real-order split for a trade amount.

use mmsim_core::Size;
use rust_decimal::Decimal;

/// Portions of one trade amount by destination.
///
/// `real` goes to the order book as a live order backed by pool funds,
/// `ai` exists only in the simulated tape. The two always sum to the
/// original amount; rounding residue lands on the AI side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquiditySplit {
    pub real: Size,
    pub ai: Size,
}

impl LiquiditySplit {
    /// Split `total` by `real_percent`. Percentages outside 0..=100 are
    /// clamped before applying.
    #[must_use]
    pub fn of(total: Size, real_percent: Decimal) -> Self {
        let pct = real_percent.clamp(Decimal::ZERO, Decimal::from(100));
        let real = (total.inner() * pct / Decimal::from(100)).round_dp(8);
        let ai = total.inner() - real;
        Self {
            real: Size::new(real),
            ai: Size::new(ai),
        }
    }

    #[must_use]
    pub fn has_real(&self) -> bool {
        self.real.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn splits_by_percent() {
        let split = LiquiditySplit::of(Size::new(dec!(10)), dec!(20));
        assert_eq!(split.real, Size::new(dec!(2)));
        assert_eq!(split.ai, Size::new(dec!(8)));
        assert!(split.has_real());
    }

    #[test]
    fn zero_percent_is_all_ai() {
        let split = LiquiditySplit::of(Size::new(dec!(10)), Decimal::ZERO);
        assert_eq!(split.real, Size::new(Decimal::ZERO));
        assert_eq!(split.ai, Size::new(dec!(10)));
        assert!(!split.has_real());
    }

    #[test]
    fn full_percent_is_all_real() {
        let split = LiquiditySplit::of(Size::new(dec!(10)), dec!(100));
        assert_eq!(split.real, Size::new(dec!(10)));
        assert_eq!(split.ai, Size::new(Decimal::ZERO));
    }

    #[test]
    fn parts_always_sum_to_total() {
        let total = Size::new(dec!(0.33333333));
        let split = LiquiditySplit::of(total, dec!(17));
        assert_eq!(split.real.inner() + split.ai.inner(), total.inner());
    }

    #[test]
    fn out_of_range_percent_is_clamped() {
        let total = Size::new(dec!(5));
        let over = LiquiditySplit::of(total, dec!(250));
        assert_eq!(over.real, total);
        let under = LiquiditySplit::of(total, dec!(-10));
        assert_eq!(under.real, Size::new(Decimal::ZERO));
    }
}
