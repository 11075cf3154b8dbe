//! Agent population for the simulation engine.
//!
//! Each market runs a population of bots. A bot couples a [`BotConfig`]
//! contract (cooldowns, daily caps, sizing parameters) with a personality
//! [`Strategy`] that turns market context into trade decisions. Strategies
//! are deliberately small state machines: they see a [`MarketContext`]
//! snapshot, roll their own seeded RNG, and either propose a
//! [`TradeDecision`](mmsim_core::TradeDecision) or skip the round.
//!
//! [`BotConfig`]: mmsim_core::BotConfig

pub mod bot;
pub mod context;
pub mod factory;
pub mod personality;
pub mod strategy;
pub mod timing;

pub use bot::Bot;
pub use context::MarketContext;
pub use factory::BotFactory;
pub use personality::{
    build_strategy, BiasStrategy, MarketMakerStrategy, ScalperStrategy, SwingStrategy,
};
pub use strategy::Strategy;
pub use timing::{SizeGenerator, TimingJitter};
