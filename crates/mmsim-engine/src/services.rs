//! Shared service bundle handed to every market loop.

use std::sync::Arc;

use mmsim_coord::BotCoordinator;
use mmsim_core::SharedClock;
use mmsim_price::DynPriceFeed;
use mmsim_risk::{LossProtection, DEFAULT_MAX_CONSECUTIVE_LOSSES};

use crate::executor::TradeExecutor;
use crate::ports::{DynConfigStore, DynEventSink, DynHistoryStore, DynOrderBook};

/// Everything a market loop needs besides its own state.
///
/// Cheap to clone; all members are shared handles.
#[derive(Clone)]
pub struct SimServices {
    pub executor: Arc<TradeExecutor>,
    pub coordinator: Arc<BotCoordinator>,
    pub loss: Arc<LossProtection>,
    pub clock: SharedClock,
    pub feed: Option<DynPriceFeed>,
    pub config_store: Option<DynConfigStore>,
}

impl SimServices {
    #[must_use]
    pub fn new(
        book: DynOrderBook,
        history: DynHistoryStore,
        events: DynEventSink,
        clock: SharedClock,
    ) -> Self {
        Self {
            executor: Arc::new(TradeExecutor::new(book, history, events)),
            coordinator: Arc::new(BotCoordinator::new()),
            loss: Arc::new(LossProtection::new(DEFAULT_MAX_CONSECUTIVE_LOSSES)),
            clock,
            feed: None,
            config_store: None,
        }
    }

    /// Attach an external reference price feed.
    #[must_use]
    pub fn with_feed(mut self, feed: DynPriceFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Attach a config store for status write-back and daily reloads.
    #[must_use]
    pub fn with_config_store(mut self, store: DynConfigStore) -> Self {
        self.config_store = Some(store);
        self
    }

    /// Replace the losing-streak cutoff. Swaps the whole ledger, so set
    /// it before any market registers.
    #[must_use]
    pub fn with_loss_cutoff(mut self, max_consecutive_losses: u32) -> Self {
        self.loss = Arc::new(LossProtection::new(max_consecutive_losses));
        self
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
