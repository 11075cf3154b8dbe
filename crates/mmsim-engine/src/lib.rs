//! Market simulation engine for mmsim.
//!
//! Wires the per-market pieces together: a [`MarketInstance`] state
//! machine per market, a [`BotRoster`](bot_manager::BotRoster) of agents
//! on top of it, and the [`SimulationEngine`] running one tick loop per
//! market. Side effects leave through the ports in [`ports`]; time comes
//! from a shared clock, so tests drive ticks by hand.

pub mod bot_manager;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod liquidity;
pub mod market_instance;
pub mod oscillator;
pub mod ports;
pub mod services;
pub mod stats;

pub use bot_manager::{BotRoster, RoundSummary, MAX_TRADES_PER_ROUND};
pub use engine::{SimulationEngine, DEFAULT_TICK_INTERVAL_MS};
pub use error::{EngineError, Result};
pub use events::SimEvent;
pub use executor::{ExecutedTrade, TradeExecutor, TradeOrigin};
pub use liquidity::LiquiditySplit;
pub use market_instance::{
    BotTradeOutcome, LifecycleState, MarketInstance, SkipReason, TickOutcome,
    MAX_CONSECUTIVE_ERRORS, MIN_ACTIVE_BOTS,
};
pub use oscillator::{OscillationStep, PriceOscillator};
pub use ports::{
    BookOrder, ConfigStore, DynConfigStore, DynEventSink, DynHistoryStore, DynOrderBook,
    EventSink, HistoryStore, MockConfigStore, MockEventSink, MockHistoryStore, MockOrderBook,
    OrderBook, PriceSample, StatusChangeRecord, TradeRecord,
};
pub use services::SimServices;
pub use stats::{EngineStats, MarketStats};
