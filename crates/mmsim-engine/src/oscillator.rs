//! Sine-plus-noise price oscillation around the configured target.

use mmsim_core::{MarketConfig, OrderSide, Price};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::f64::consts::TAU;

/// Phase advance per tick, drawn uniformly from this band (radians).
const PHASE_STEP: std::ops::Range<f64> = 0.1..0.5;

/// One oscillation result.
///
/// `side` is derived from the price delta AFTER clamping into the range:
/// a raw wave value outside the range must not push in the direction the
/// unclamped value suggested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillationStep {
    pub next_price: Price,
    pub delta: Decimal,
    pub side: Option<OrderSide>,
}

/// Walks a sine wave around the target with Gaussian noise on top.
///
/// Amplitude comes from the market's aggression level as a percentage of
/// the target price; noise sigma is a third of the amplitude so the wave
/// shape stays recognizable but never exactly repeats.
#[derive(Debug)]
pub struct PriceOscillator {
    phase: f64,
    rng: StdRng,
}

impl PriceOscillator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            phase: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Advance the wave one tick and propose the next price.
    pub fn step(&mut self, config: &MarketConfig, current: Price) -> OscillationStep {
        let target = config.target_price.inner();
        let amplitude = (target * config.aggression.amplitude_pct() / Decimal::from(100))
            .to_f64()
            .unwrap_or(0.0);

        self.phase = (self.phase + self.rng.gen_range(PHASE_STEP)) % TAU;

        let wave = amplitude * self.phase.sin();
        let noise = if amplitude > 0.0 {
            Normal::new(0.0, amplitude / 3.0)
                .map(|n| n.sample(&mut self.rng))
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let raw = target.to_f64().unwrap_or(0.0) + wave + noise;
        let unclamped = Decimal::from_f64_retain(raw)
            .unwrap_or(target)
            .round_dp(8);
        let next_price =
            Price::new(unclamped).clamp_to(config.price_range_low, config.price_range_high);

        let delta = next_price.inner() - current.inner();
        let side = if delta > Decimal::ZERO {
            Some(OrderSide::Buy)
        } else if delta < Decimal::ZERO {
            Some(OrderSide::Sell)
        } else {
            None
        };

        OscillationStep {
            next_price,
            delta,
            side,
        }
    }
}
