//! The five trading personalities.
//!
//! | Personality   | Style                                        | Cooldown |
//! |---------------|----------------------------------------------|----------|
//! | Scalper       | small fades of the last micro-move           | 10s      |
//! | Swing         | position cycles off range support/resistance | 60s      |
//! | Accumulator   | patient buy-side pressure                    | 120s     |
//! | Distributor   | patient sell-side pressure                   | 120s     |
//! | Market maker  | alternating two-sided quotes, inventory-aware| 5s       |

mod bias;
mod market_maker;
mod scalper;
mod swing;

pub use bias::BiasStrategy;
pub use market_maker::MarketMakerStrategy;
pub use scalper::ScalperStrategy;
pub use swing::SwingStrategy;

use crate::strategy::Strategy;
use mmsim_core::Personality;

/// Instantiate the strategy state machine for a personality.
#[must_use]
pub fn build_strategy(personality: Personality) -> Box<dyn Strategy> {
    match personality {
        Personality::Scalper => Box::new(ScalperStrategy::new()),
        Personality::Swing => Box::new(SwingStrategy::new()),
        Personality::Accumulator => Box::new(BiasStrategy::accumulator()),
        Personality::Distributor => Box::new(BiasStrategy::distributor()),
        Personality::MarketMaker => Box::new(MarketMakerStrategy::new()),
    }
}
