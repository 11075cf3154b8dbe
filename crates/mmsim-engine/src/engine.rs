//! Multi-market orchestration.
//!
//! The engine keeps one [`MarketRuntime`] per registered market: the
//! instance and roster behind async mutexes, a cancellation token and the
//! spawned loop handle. Ticks for different markets never contend; within
//! one market the mutexes serialize ticks, stats reads and config swaps,
//! so config changes land exactly on tick boundaries.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mmsim_agents::BotFactory;
use mmsim_core::{BotId, MarketConfig, MarketId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bot_manager::BotRoster;
use crate::error::{EngineError, Result};
use crate::market_instance::{LifecycleState, MarketInstance, TickOutcome};
use crate::services::SimServices;
use crate::stats::{EngineStats, MarketStats};

/// Default per-market tick cadence.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

struct MarketRuntime {
    instance: Mutex<MarketInstance>,
    roster: Mutex<BotRoster>,
    token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

pub struct SimulationEngine {
    services: SimServices,
    markets: DashMap<MarketId, Arc<MarketRuntime>>,
    tick_interval_ms: u64,
    base_seed: u64,
    shutdown: CancellationToken,
}

impl SimulationEngine {
    #[must_use]
    pub fn new(services: SimServices) -> Self {
        Self {
            services,
            markets: DashMap::new(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            base_seed: 0,
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the tick cadence (tests, accelerated sims).
    #[must_use]
    pub fn with_tick_interval(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms.max(1);
        self
    }

    /// Seed for oscillators, tick rolls and bot strategies. Every market
    /// derives its own stream from it, so two markets never share one.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    #[must_use]
    pub fn services(&self) -> &SimServices {
        &self.services
    }

    #[must_use]
    pub fn market_count(&self) -> usize {
        self.markets.len()
    }

    #[must_use]
    pub fn market_ids(&self) -> Vec<MarketId> {
        self.markets.iter().map(|e| *e.key()).collect()
    }

    // =====================================================================
    // Registration and lifecycle
    // =====================================================================

    /// Register a market in `Initializing` state.
    ///
    /// A config without bots gets the standard population mix. The market
    /// does not tick until [`SimulationEngine::start_market`].
    pub fn add_market(&self, config: MarketConfig) -> Result<MarketId> {
        let id = config.id;
        let bot_configs = if config.bots.is_empty() {
            BotFactory::default_population()
        } else {
            config.bots.clone()
        };

        let instance = MarketInstance::new(config, &self.services, self.base_seed)?;
        let factory = BotFactory::new(self.base_seed);
        let bots = factory.build_population(id, bot_configs)?;
        let roster = BotRoster::new(id, bots, self.base_seed ^ id.0);

        let runtime = Arc::new(MarketRuntime {
            instance: Mutex::new(instance),
            roster: Mutex::new(roster),
            token: self.shutdown.child_token(),
            handle: Mutex::new(None),
        });

        match self.markets.entry(id) {
            Entry::Occupied(_) => Err(EngineError::DuplicateMarket(id)),
            Entry::Vacant(slot) => {
                slot.insert(runtime);
                info!(market = %id, "market registered");
                Ok(id)
            }
        }
    }

    /// Start a registered market and spawn its tick loop.
    pub async fn start_market(&self, id: MarketId) -> Result<()> {
        let runtime = self.runtime(id)?;
        {
            let mut instance = runtime.instance.lock().await;
            instance.start(&self.services).await?;
        }
        let mut slot = runtime.handle.lock().await;
        if slot.is_none() {
            *slot = Some(self.spawn_loop(id, runtime.clone()));
        }
        Ok(())
    }

    pub async fn pause_market(&self, id: MarketId, reason: &str) -> Result<()> {
        let runtime = self.runtime(id)?;
        let mut instance = runtime.instance.lock().await;
        instance.pause(&self.services, reason).await
    }

    /// Resume a paused or errored market. Also reactivates the roster so
    /// a market frozen by an emergency stop comes back trading.
    pub async fn resume_market(&self, id: MarketId) -> Result<()> {
        let runtime = self.runtime(id)?;
        let mut instance = runtime.instance.lock().await;
        let mut roster = runtime.roster.lock().await;
        instance.resume(&self.services).await?;
        roster.activate_all();
        Ok(())
    }

    /// Stop a market permanently and tear down its loop.
    pub async fn stop_market(&self, id: MarketId, reason: &str) -> Result<()> {
        let runtime = self.runtime(id)?;
        {
            let mut instance = runtime.instance.lock().await;
            instance.stop(&self.services, reason).await?;
        }
        runtime.token.cancel();
        if let Some(handle) = runtime.handle.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }

    /// Drop a market entirely. Returns false when the id is unknown.
    pub async fn remove_market(&self, id: MarketId) -> bool {
        let Some((_, runtime)) = self.markets.remove(&id) else {
            return false;
        };
        {
            let mut instance = runtime.instance.lock().await;
            if instance.state() != LifecycleState::Stopped {
                if let Err(err) = instance.stop(&self.services, "market removed").await {
                    warn!(market = %id, error = %err, "stop during removal failed");
                }
            }
        }
        runtime.token.cancel();
        if let Some(handle) = runtime.handle.lock().await.take() {
            let _ = handle.await;
        }
        info!(market = %id, "market removed");
        true
    }

    // =====================================================================
    // Ticking
    // =====================================================================

    /// Drive one tick by hand: process the instance, then the bot round.
    ///
    /// This is the same sequence the spawned loop runs; tests and
    /// replay-style callers use it with a manual clock instead of
    /// starting the loop.
    pub async fn tick_market(&self, id: MarketId) -> Result<TickOutcome> {
        let runtime = self.runtime(id)?;
        let mut instance = runtime.instance.lock().await;
        let mut roster = runtime.roster.lock().await;
        let outcome = instance
            .process(&self.services, roster.active_count())
            .await;
        if outcome.allows_bot_round() {
            roster.run_round(&mut instance, &self.services).await;
        }
        Ok(outcome)
    }

    fn spawn_loop(&self, id: MarketId, runtime: Arc<MarketRuntime>) -> JoinHandle<()> {
        let services = self.services.clone();
        let token = runtime.token.clone();
        let interval_ms = self.tick_interval_ms;
        tokio::spawn(async move {
            // First tick lands one period after start; `start()` already
            // primed the market, an immediate tick would double up.
            let period = Duration::from_millis(interval_ms);
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(market = %id, interval_ms, "market loop started");
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        debug!(market = %id, "market loop cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let mut instance = runtime.instance.lock().await;
                        let mut roster = runtime.roster.lock().await;
                        let outcome = instance
                            .process(&services, roster.active_count())
                            .await;
                        if outcome.allows_bot_round() {
                            roster.run_round(&mut instance, &services).await;
                        }
                        if instance.state() == LifecycleState::Stopped {
                            debug!(market = %id, "market loop finished");
                            break;
                        }
                    }
                }
            }
        })
    }

    // =====================================================================
    // Maintenance and introspection
    // =====================================================================

    /// Swap a market's config; applied on the next tick boundary.
    pub async fn update_market_config(&self, id: MarketId, config: MarketConfig) -> Result<()> {
        let runtime = self.runtime(id)?;
        let mut instance = runtime.instance.lock().await;
        instance.update_config(config)
    }

    pub async fn pause_bot(&self, market: MarketId, bot: BotId) -> Result<bool> {
        let runtime = self.runtime(market)?;
        let mut roster = runtime.roster.lock().await;
        Ok(roster.pause_bot(bot))
    }

    pub async fn activate_bot(&self, market: MarketId, bot: BotId) -> Result<bool> {
        let runtime = self.runtime(market)?;
        let mut roster = runtime.roster.lock().await;
        Ok(roster.activate_bot(bot))
    }

    /// Pause every market, freeze its bots and pull all resting orders.
    /// Loops stay alive so operators can resume market by market.
    pub async fn emergency_stop_all(&self, reason: &str) {
        warn!(reason, "emergency stop for all markets");
        for runtime in self.runtimes() {
            let mut instance = runtime.instance.lock().await;
            let mut roster = runtime.roster.lock().await;
            roster.pause_all();
            if let Err(err) = instance.emergency_stop(&self.services, reason).await {
                warn!(error = %err, "emergency stop failed for market");
            }
        }
    }

    /// Midnight rollover across all markets plus the loss ledger.
    ///
    /// When a config store is attached, each market also reloads its
    /// stored config so parameter edits land with the new day.
    pub async fn reset_daily(&self) {
        for runtime in self.runtimes() {
            let mut instance = runtime.instance.lock().await;
            let mut roster = runtime.roster.lock().await;
            instance.reset_daily();
            roster.reset_daily();
            if let Some(store) = &self.services.config_store {
                let id = instance.market_id();
                match store.load_market_config(id).await {
                    Ok(Some(config)) => {
                        if let Err(err) = instance.update_config(config) {
                            warn!(market = %id, error = %err, "stored config rejected");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(market = %id, error = %err, "config reload failed");
                    }
                }
            }
        }
        self.services.loss.reset_daily(self.services.now_ms());
        info!("daily counters reset");
    }

    pub async fn market_stats(&self, id: MarketId) -> Result<MarketStats> {
        let runtime = self.runtime(id)?;
        let instance = runtime.instance.lock().await;
        let roster = runtime.roster.lock().await;
        Ok(instance.stats(roster.active_count(), roster.len(), self.services.now_ms()))
    }

    pub async fn engine_stats(&self) -> EngineStats {
        let now = self.services.now_ms();
        let mut per_market = Vec::with_capacity(self.markets.len());
        for runtime in self.runtimes() {
            let instance = runtime.instance.lock().await;
            let roster = runtime.roster.lock().await;
            per_market.push(instance.stats(roster.active_count(), roster.len(), now));
        }
        per_market.sort_by_key(|m| m.market_id.0);
        EngineStats::from_markets(per_market)
    }

    /// Stop every market and cancel all loops.
    pub async fn shutdown(&self) {
        info!("engine shutting down");
        self.shutdown.cancel();
        for id in self.market_ids() {
            if let Err(err) = self.stop_market(id, "engine shutdown").await {
                debug!(market = %id, error = %err, "market already out of service");
            }
        }
    }

    fn runtime(&self, id: MarketId) -> Result<Arc<MarketRuntime>> {
        self.markets
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::MarketNotFound(id))
    }

    /// Snapshot of runtimes; never hold map guards across awaits.
    fn runtimes(&self) -> Vec<Arc<MarketRuntime>> {
        self.markets.iter().map(|e| e.value().clone()).collect()
    }
}
