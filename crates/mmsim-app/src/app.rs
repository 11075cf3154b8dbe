//! Main application orchestration.
//!
//! Wires the in-memory backends, the engine and the optional reference
//! feed from [`AppConfig`], registers every configured market and drives
//! the run loop: stats summaries on an interval, daily resets on UTC day
//! rollover, ctrl-c for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use mmsim_core::{day_number, SharedClock, SystemClock};
use mmsim_engine::{SimServices, SimulationEngine};
use mmsim_price::HttpPriceFeed;
use tracing::{info, warn};

use crate::backends::{FileConfigStore, LogEventSink, RingHistory, SimOrderBook};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// How often the loop checks for a UTC day rollover.
const DAY_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Main application.
pub struct Application {
    config: AppConfig,
    engine: SimulationEngine,
    clock: SharedClock,
}

impl Application {
    /// Build the engine and its collaborators from configuration.
    ///
    /// Markets are not registered yet; `run()` does that on entry.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let clock: SharedClock = Arc::new(SystemClock);
        let book = Arc::new(SimOrderBook::new());
        let history = Arc::new(RingHistory::new());
        let events = Arc::new(LogEventSink::new());

        let mut services = SimServices::new(book, history, events, clock.clone())
            .with_loss_cutoff(config.risk.max_consecutive_losses);
        if config.feed.enabled {
            info!(base_url = %config.feed.base_url, "Reference feed enabled");
            services = services.with_feed(Arc::new(HttpPriceFeed::new(&config.feed.base_url)));
        }
        if let Some(path) = &config.source_path {
            services = services.with_config_store(Arc::new(FileConfigStore::new(path.clone())));
        }

        let engine = SimulationEngine::new(services)
            .with_tick_interval(config.engine.tick_interval_ms)
            .with_seed(config.engine.seed);

        Ok(Self {
            config,
            engine,
            clock,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    /// Register and start every configured market.
    ///
    /// A market that fails to start is logged and skipped so one bad
    /// config does not take the others down. Errors out only when
    /// nothing started.
    pub async fn start_markets(&self) -> AppResult<usize> {
        let mut started = 0usize;
        for seed in &self.config.markets {
            let market = seed.to_market_config();
            let id = self.engine.add_market(market)?;
            match self.engine.start_market(id).await {
                Ok(()) => started += 1,
                Err(e) => warn!(market = %id, error = %e, "Market failed to start"),
            }
        }
        if started == 0 {
            return Err(AppError::Config("no market started".to_string()));
        }
        Ok(started)
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run(self) -> AppResult<()> {
        let started = self.start_markets().await?;
        info!(markets = started, "Entering main loop");

        let stats_secs = self.config.telemetry.stats_interval_secs.max(1);
        let mut stats_interval = tokio::time::interval(Duration::from_secs(stats_secs));
        let mut day_check = tokio::time::interval(DAY_CHECK_INTERVAL);
        let mut current_day = day_number(self.clock.now_ms());

        loop {
            tokio::select! {
                _ = stats_interval.tick() => {
                    self.log_stats().await;
                }

                _ = day_check.tick() => {
                    let today = day_number(self.clock.now_ms());
                    if today > current_day {
                        info!(day = today, "UTC day rollover");
                        self.engine.reset_daily().await;
                        current_day = today;
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.engine.shutdown().await;
        info!("Final statistics summary:");
        self.log_stats().await;
        Ok(())
    }

    async fn log_stats(&self) {
        let stats = self.engine.engine_stats().await;
        info!(
            markets = stats.markets,
            running = stats.running,
            paused = stats.paused,
            trades = stats.total_trades,
            volume = %stats.total_volume,
            "Stats summary"
        );
        for market in &stats.per_market {
            info!(
                market = %market.market_id,
                symbol = %market.symbol,
                state = %market.state,
                price = %market.current_price,
                trades = market.trades_executed,
                errors = market.error_count,
                "Market summary"
            );
        }
    }
}
