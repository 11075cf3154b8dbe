//! Per-market simulation state machine.
//!
//! One [`MarketInstance`] owns everything that belongs to a single market:
//! its config, price tracker, oscillator, circuit breaker and counters.
//! The engine drives it through [`MarketInstance::process`] once per tick
//! and runs the bot round between ticks. All methods take the current time
//! from the shared clock, nothing here sleeps.

use mmsim_agents::{Bot, MarketContext};
use mmsim_coord::{Coordination, CoordinationContext, CoordinationRule, RecordedTrade};
use mmsim_core::{
    BookTop, BotId, MarketConfig, MarketId, MarketStatus, OrderSide, Price, Size, TradeDecision,
    TradePurpose,
};
use mmsim_price::{PricePoint, PriceTracker};
use mmsim_risk::{CircuitBreaker, TripReason, DEFAULT_BREAKER_COOLDOWN_MS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::executor::{ExecutedTrade, TradeOrigin};
use crate::oscillator::PriceOscillator;
use crate::ports::{BookOrder, PriceSample, StatusChangeRecord};
use crate::services::SimServices;
use crate::stats::MarketStats;
use crate::SimEvent;

/// Markets refuse to trade with fewer active bots than this.
pub const MIN_ACTIVE_BOTS: usize = 2;

/// Errored executions a market tolerates in a row. One more pauses it.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Every Nth tick the current price is appended to stored history.
const PRICE_SAMPLE_EVERY_TICKS: u64 = 10;

/// How many recorded trades warm the tracker on start.
const WARM_HISTORY_TRADES: usize = 100;

/// Book seed levels relative to the target price, in bps.
const SEED_LEVELS: [(OrderSide, Decimal); 4] = [
    (OrderSide::Buy, dec!(-25)),
    (OrderSide::Buy, dec!(-50)),
    (OrderSide::Sell, dec!(25)),
    (OrderSide::Sell, dec!(50)),
];

// =========================================================================
// Lifecycle
// =========================================================================

/// Where a market is in its run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleState {
    Initializing,
    Running,
    Paused,
    Stopped,
    Error,
}

impl LifecycleState {
    /// Whether `self -> to` is a legal transition.
    ///
    /// `Stopped` is terminal. Any live state may fall into `Error` on an
    /// unrecoverable setup failure; `Error` recovers through `Running`
    /// (manual resume) or `Stopped`.
    #[must_use]
    pub fn can_transition_to(self, to: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, to) {
            (Stopped, _) => false,
            (_, Error) => true,
            (Initializing, Running | Stopped) => true,
            (Running, Paused | Stopped) => true,
            (Paused, Running | Stopped) => true,
            (Error, Running | Stopped) => true,
            _ => false,
        }
    }

    /// Coarse status as persisted to the config store.
    #[must_use]
    pub fn as_market_status(self) -> MarketStatus {
        match self {
            Self::Running => MarketStatus::Active,
            Self::Stopped => MarketStatus::Stopped,
            Self::Initializing | Self::Paused | Self::Error => MarketStatus::Paused,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "INITIALIZING",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Stopped => "STOPPED",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Why a tick produced no engine trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotRunning,
    InsufficientBots,
    PoolUnfunded,
    VolumeCapReached,
    HighVolatility,
    BreakerOpen,
    LossLimited,
}

impl SkipReason {
    /// Short label for metrics.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NotRunning => "not_running",
            Self::InsufficientBots => "insufficient_bots",
            Self::PoolUnfunded => "pool_unfunded",
            Self::VolumeCapReached => "volume_cap",
            Self::HighVolatility => "high_volatility",
            Self::BreakerOpen => "breaker_open",
            Self::LossLimited => "loss_limited",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotRunning => "market not running",
            Self::InsufficientBots => "not enough active bots",
            Self::PoolUnfunded => "pool unfunded",
            Self::VolumeCapReached => "daily volume cap reached",
            Self::HighVolatility => "volatility above threshold",
            Self::BreakerOpen => "circuit breaker open",
            Self::LossLimited => "loss protection engaged",
        };
        f.write_str(s)
    }
}

/// Result of one tick.
///
/// `Skipped` also vetoes the bot round for this tick; `Idle` means the
/// probability roll produced no engine trade but bots may still act.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Idle,
    Traded {
        side: OrderSide,
        price: Price,
        amount: Size,
    },
}

impl TickOutcome {
    /// Whether bots are allowed to trade after this tick.
    #[must_use]
    pub fn allows_bot_round(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

/// Result of pushing one bot decision through coordination and execution.
#[derive(Debug, Clone)]
pub enum BotTradeOutcome {
    Executed {
        side: OrderSide,
        price: Price,
        amount: Size,
        pnl: Decimal,
    },
    Rejected {
        rule: CoordinationRule,
        reason: String,
    },
    Skipped(&'static str),
}

// =========================================================================
// Instance
// =========================================================================

pub struct MarketInstance {
    config: MarketConfig,
    state: LifecycleState,
    tracker: PriceTracker,
    oscillator: PriceOscillator,
    breaker: CircuitBreaker,
    rng: StdRng,
    /// Sentinel identity for engine-originated trades in the pressure
    /// window.
    engine_actor: BotId,
    tick_count: u64,
    trades_executed: u64,
    consecutive_errors: u32,
    /// Lifetime errored operations. Survives resume, tells a budget pause
    /// apart from an operator pause.
    error_count: u64,
    last_book_top: Option<BookTop>,
}

impl MarketInstance {
    pub fn new(config: MarketConfig, services: &SimServices, seed: u64) -> Result<Self> {
        config.validate()?;
        let tracker = PriceTracker::new(
            config.symbol.clone(),
            config.target_price,
            services.feed.clone(),
        );
        let rng_seed = seed ^ config.id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Ok(Self {
            state: LifecycleState::Initializing,
            tracker,
            oscillator: PriceOscillator::new(rng_seed.rotate_left(17)),
            breaker: CircuitBreaker::new(DEFAULT_BREAKER_COOLDOWN_MS),
            rng: StdRng::seed_from_u64(rng_seed),
            engine_actor: BotId::generate(),
            tick_count: 0,
            trades_executed: 0,
            consecutive_errors: 0,
            error_count: 0,
            last_book_top: None,
            config,
        })
    }

    // =====================================================================
    // Accessors
    // =====================================================================

    #[must_use]
    pub fn market_id(&self) -> MarketId {
        self.config.id
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    #[must_use]
    pub fn current_price(&self) -> Price {
        self.tracker.current()
    }

    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    // =====================================================================
    // Lifecycle operations
    // =====================================================================

    /// Move the market from `Initializing` into `Running`.
    ///
    /// Purges orders left behind by a previous run, restores price
    /// continuity, registers with the coordinator and loss protection,
    /// and seeds the book when a funded pool backs real liquidity. A book
    /// that rejects every seed order leaves the market in `Error`.
    pub async fn start(&mut self, services: &SimServices) -> Result<()> {
        if self.state != LifecycleState::Initializing {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to: LifecycleState::Running,
            });
        }
        let now = services.now_ms();

        services.coordinator.register_market(self.config.id);
        let capital = self
            .config
            .pool
            .as_ref()
            .map(|p| p.tvl)
            .unwrap_or(Decimal::ZERO);
        services.loss.register_market(self.config.id, capital, now);

        let purged = services.executor.cancel_all(&self.config).await;
        if purged > 0 {
            info!(market = %self.config.symbol, purged, "stale orders purged");
        }
        self.restore_price(services, now).await;

        if self.config.real_liquidity_percent > Decimal::ZERO
            && self.pool_funded()
            && self.seed_book(services, now).await == 0
        {
            let _ = self
                .set_state(
                    services,
                    LifecycleState::Error,
                    "order book rejected every seed order",
                )
                .await;
            return Err(EngineError::Book(
                "order book unavailable during market start".to_string(),
            ));
        }

        // Downstream consumers see a price and a mirror from tick zero.
        services
            .executor
            .sync_visible_liquidity(
                &self.config,
                self.tracker.current(),
                Size::new(self.base_trade_amount()),
            )
            .await;
        services
            .executor
            .record_price_sample(PriceSample {
                market: self.config.id,
                price: self.tracker.current(),
                at_ms: now,
            })
            .await;

        self.set_state(services, LifecycleState::Running, "market started")
            .await?;
        info!(
            market = %self.config.symbol,
            start_price = %self.tracker.current(),
            "market running"
        );
        Ok(())
    }

    /// Pause trading. Resting orders stay on the book so a later resume
    /// picks up exactly where the market left off.
    pub async fn pause(&mut self, services: &SimServices, reason: &str) -> Result<()> {
        self.set_state(services, LifecycleState::Paused, reason)
            .await?;
        Ok(())
    }

    /// Halt trading and pull every resting order for this market. Lands
    /// in PAUSED so an operator can resume once the incident clears.
    pub async fn emergency_stop(&mut self, services: &SimServices, reason: &str) -> Result<()> {
        if self.is_running() {
            self.set_state(services, LifecycleState::Paused, reason)
                .await?;
        }
        services.executor.cancel_all(&self.config).await;
        Ok(())
    }

    /// Resume a paused (or errored) market. Clears the breaker latch and
    /// the error streak; the lifetime error count stays for diagnostics.
    pub async fn resume(&mut self, services: &SimServices) -> Result<()> {
        self.set_state(services, LifecycleState::Running, "resumed by operator")
            .await?;
        self.breaker.reset();
        self.consecutive_errors = 0;
        Ok(())
    }

    /// Stop the market for good and release shared per-market state.
    pub async fn stop(&mut self, services: &SimServices, reason: &str) -> Result<()> {
        self.set_state(services, LifecycleState::Stopped, reason)
            .await?;
        services.executor.cancel_all(&self.config).await;
        services.coordinator.clear_market(self.config.id);
        services.loss.remove_market(self.config.id);
        Ok(())
    }

    async fn set_state(
        &mut self,
        services: &SimServices,
        to: LifecycleState,
        reason: &str,
    ) -> Result<LifecycleState> {
        if !self.state.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        let from = self.state;
        self.state = to;
        debug!(market = %self.config.symbol, %from, %to, reason, "lifecycle transition");
        let at_ms = services.now_ms();
        if let Some(store) = &services.config_store {
            if let Err(err) = store.save_status(self.config.id, to.as_market_status()).await {
                warn!(market = %self.config.symbol, error = %err, "status write-back failed");
            }
            let record = StatusChangeRecord {
                market: self.config.id,
                from: from.to_string(),
                to: to.to_string(),
                reason: reason.to_string(),
                at_ms,
            };
            if let Err(err) = store.append_history(record).await {
                warn!(market = %self.config.symbol, error = %err, "status history append failed");
            }
        }
        services
            .executor
            .announce(SimEvent::StatusChange {
                market: self.config.symbol.clone(),
                from: from.to_string(),
                to: to.to_string(),
                reason: reason.to_string(),
                at_ms,
            })
            .await;
        Ok(from)
    }

    // =====================================================================
    // Tick processing
    // =====================================================================

    /// Run one tick: refresh inputs, walk the gate chain, maybe trade.
    ///
    /// `active_bots` is the roster's current active count; the roster
    /// itself runs after this, and only when the outcome allows it.
    pub async fn process(&mut self, services: &SimServices, active_bots: usize) -> TickOutcome {
        let outcome = self.process_tick(services, active_bots).await;
        self.record_gauges(services, active_bots);
        outcome
    }

    async fn process_tick(&mut self, services: &SimServices, active_bots: usize) -> TickOutcome {
        if self.state != LifecycleState::Running {
            return self.skip(SkipReason::NotRunning);
        }
        let now = services.now_ms();
        self.tick_count += 1;
        mmsim_telemetry::Metrics::tick(&self.config.symbol);

        self.tracker.refresh(now).await;
        self.last_book_top = services.executor.book_top(&self.config).await;

        if self.tick_count % PRICE_SAMPLE_EVERY_TICKS == 0 {
            let sampled = services
                .executor
                .record_price_sample(PriceSample {
                    market: self.config.id,
                    price: self.tracker.current(),
                    at_ms: now,
                })
                .await;
            if !sampled {
                self.note_error();
                self.check_degradation(services).await;
                if self.state != LifecycleState::Running {
                    return self.skip(SkipReason::NotRunning);
                }
            }
        }

        if active_bots < MIN_ACTIVE_BOTS {
            return self.skip(SkipReason::InsufficientBots);
        }
        if self.config.real_liquidity_percent > Decimal::ZERO && !self.pool_funded() {
            return self.skip(SkipReason::PoolUnfunded);
        }
        if self.config.volume_cap_reached() {
            return self.skip(SkipReason::VolumeCapReached);
        }

        let volatility = self.tracker.volatility_pct();
        if volatility > self.config.volatility_threshold {
            self.breaker.trip(
                TripReason::HighVolatility {
                    volatility_pct: volatility,
                },
                now,
            );
            if self.config.pause_on_high_volatility {
                let _ = self
                    .pause(services, "volatility above threshold")
                    .await;
            }
            return self.skip(SkipReason::HighVolatility);
        }
        if self.breaker.is_tripped(now) {
            return self.skip(SkipReason::BreakerOpen);
        }
        if services.loss.should_stop_trading(self.config.id, now) {
            let count = services.loss.consecutive_losses(self.config.id, now);
            self.breaker
                .trip(TripReason::ConsecutiveLosses { count }, now);
            return self.skip(SkipReason::LossLimited);
        }

        if !self
            .rng
            .gen_bool(self.config.aggression.trade_probability())
        {
            return TickOutcome::Idle;
        }

        let step = self.oscillator.step(&self.config, self.tracker.current());
        self.tracker.record(step.next_price, now);
        let Some(side) = step.side else {
            return TickOutcome::Idle;
        };

        let amount = self.engine_amount();
        let amount = self.cap_to_headroom(amount);
        let executed = services
            .executor
            .execute(
                &self.config,
                side,
                step.next_price,
                amount,
                TradePurpose::PricePush,
                &TradeOrigin::Engine,
                now,
            )
            .await;
        self.apply_execution(&executed, amount);
        self.check_degradation(services).await;

        services.coordinator.record_trade(
            self.config.id,
            RecordedTrade {
                bot: self.engine_actor,
                side,
                price: step.next_price,
                amount,
                at_ms: now,
            },
        );

        TickOutcome::Traded {
            side,
            price: step.next_price,
            amount,
        }
    }

    /// Coordinate and execute one bot decision.
    ///
    /// Rejections are normal skips; the bot's cooldown only starts on an
    /// actual execution.
    pub async fn execute_bot_decision(
        &mut self,
        services: &SimServices,
        bot: &mut Bot,
        decision: TradeDecision,
    ) -> BotTradeOutcome {
        if self.state != LifecycleState::Running {
            return BotTradeOutcome::Skipped("market not running");
        }
        if self.config.volume_cap_reached() {
            return BotTradeOutcome::Skipped("daily volume cap reached");
        }
        let now = services.now_ms();

        let ctx = CoordinationContext {
            current_price: self.tracker.current(),
            book_top: self.last_book_top,
            now_ms: now,
        };
        let mut decision =
            match services
                .coordinator
                .coordinate_trade(self.config.id, bot.id(), decision, &ctx)
            {
                Coordination::Approved { decision, .. } => decision,
                Coordination::Rejected { rule, reason } => {
                    mmsim_telemetry::Metrics::coordination_rejected(
                        &self.config.symbol,
                        &rule.to_string(),
                    );
                    return BotTradeOutcome::Rejected { rule, reason };
                }
            };
        decision.amount = self.cap_to_headroom(decision.amount);

        let origin = TradeOrigin::Bot {
            id: bot.id(),
            name: bot.name().to_string(),
        };
        let executed = services
            .executor
            .execute(
                &self.config,
                decision.side,
                decision.price,
                decision.amount,
                decision.purpose,
                &origin,
                now,
            )
            .await;
        self.apply_execution(&executed, decision.amount);
        self.check_degradation(services).await;

        services.coordinator.record_trade(
            self.config.id,
            RecordedTrade {
                bot: bot.id(),
                side: decision.side,
                price: decision.price,
                amount: decision.amount,
                at_ms: now,
            },
        );

        // Mark-to-market against the post-oscillation price at fill time.
        let pnl = (self.tracker.current().inner() - decision.price.inner())
            * decision.amount.inner()
            * Decimal::from(decision.side.sign());
        services.loss.record_trade(self.config.id, pnl, now);

        bot.on_trade_executed(decision.side, decision.price, decision.amount, now);
        services
            .executor
            .announce(SimEvent::BotActivity {
                market: self.config.symbol.clone(),
                bot: bot.name().to_string(),
                personality: bot.personality().to_string(),
                action: decision.purpose.to_string(),
                detail: decision.reason.clone(),
                at_ms: now,
            })
            .await;

        BotTradeOutcome::Executed {
            side: decision.side,
            price: decision.price,
            amount: decision.amount,
            pnl,
        }
    }

    /// Assemble the per-tick view the strategies decide from.
    #[must_use]
    pub fn market_context(&self, services: &SimServices, now_ms: u64) -> MarketContext {
        MarketContext {
            market_id: self.config.id,
            current_price: self.tracker.current(),
            target_price: self.config.target_price,
            range_low: self.config.price_range_low,
            range_high: self.config.price_range_high,
            volatility_pct: self.tracker.volatility_pct(),
            change_pct: self.tracker.change_pct(),
            micro_change_pct: self.micro_change_pct(),
            book_top: self.last_book_top,
            recommended_side: services.coordinator.recommended_side(self.config.id, now_ms),
            now_ms,
        }
    }

    // =====================================================================
    // Maintenance
    // =====================================================================

    /// Swap in a new config at a tick boundary. The market id and the
    /// running daily volume counter survive the swap.
    pub fn update_config(&mut self, mut new: MarketConfig) -> Result<()> {
        new.validate()?;
        new.id = self.config.id;
        new.current_daily_volume = self.config.current_daily_volume;
        info!(market = %new.symbol, "market config updated");
        self.config = new;
        Ok(())
    }

    /// Midnight rollover: zero the daily volume counter.
    pub fn reset_daily(&mut self) {
        self.config.current_daily_volume = Decimal::ZERO;
    }

    #[must_use]
    pub fn stats(&self, active_bots: usize, total_bots: usize, now_ms: u64) -> MarketStats {
        let breaker_tripped = self.breaker.is_tripped(now_ms);
        MarketStats {
            market_id: self.config.id,
            symbol: self.config.symbol.clone(),
            state: self.state,
            current_price: self.tracker.current(),
            target_price: self.config.target_price,
            volatility_pct: self.tracker.volatility_pct(),
            tick_count: self.tick_count,
            trades_executed: self.trades_executed,
            error_count: self.error_count,
            daily_volume: self.config.current_daily_volume,
            volume_cap: self.config.max_daily_volume,
            active_bots,
            total_bots,
            breaker_tripped,
            trading_halted: self.state != LifecycleState::Running || breaker_tripped,
        }
    }

    // =====================================================================
    // Internals
    // =====================================================================

    fn pool_funded(&self) -> bool {
        self.config
            .pool
            .as_ref()
            .map(|p| p.is_funded())
            .unwrap_or(false)
    }

    /// Price continuity on start: recorded history first, then the feed,
    /// then the configured target the tracker was built with.
    async fn restore_price(&mut self, services: &SimServices, now: u64) {
        let recent = services
            .executor
            .recent_trades(self.config.id, WARM_HISTORY_TRADES)
            .await;
        if !recent.is_empty() {
            self.tracker
                .seed_history(recent.iter().rev().map(|t| PricePoint {
                    price: t.price,
                    at_ms: t.at_ms,
                }));
        }
        match services.executor.last_close_price(self.config.id).await {
            Some(close) => self.tracker.record(close, now),
            None => {
                self.tracker.refresh(now).await;
            }
        }
    }

    /// Typical engine trade size: 0.1% of the pool's base balance, or one
    /// unit when no pool is configured, jittered by +-50%.
    fn engine_amount(&mut self) -> Size {
        let base = self.base_trade_amount();
        let factor = Decimal::from_f64_retain(self.rng.gen_range(0.5..1.5))
            .unwrap_or(Decimal::ONE);
        let amount = (base * factor).round_dp(8);
        if amount > Decimal::ZERO {
            Size::new(amount)
        } else {
            Size::new(Decimal::ONE)
        }
    }

    fn base_trade_amount(&self) -> Decimal {
        let base = self
            .config
            .pool
            .as_ref()
            .map(|p| p.base_balance.inner() * dec!(0.001))
            .unwrap_or(Decimal::ZERO);
        if base > Decimal::ZERO {
            base
        } else {
            Decimal::ONE
        }
    }

    /// Shrink a trade to what the daily cap still allows. The cap gate
    /// already rejected saturated markets, so headroom is positive here;
    /// this keeps the final trade of the day from overshooting it.
    fn cap_to_headroom(&self, amount: Size) -> Size {
        if self.config.max_daily_volume.is_zero() {
            return amount;
        }
        let headroom = self.config.max_daily_volume - self.config.current_daily_volume;
        if amount.inner() > headroom {
            Size::new(headroom.max(Decimal::ZERO))
        } else {
            amount
        }
    }

    fn micro_change_pct(&self) -> Decimal {
        let hist = self.tracker.history();
        let n = hist.len();
        if n < 2 {
            return Decimal::ZERO;
        }
        hist[n - 1]
            .price
            .pct_from(hist[n - 2].price)
            .unwrap_or(Decimal::ZERO)
    }

    fn apply_execution(&mut self, executed: &ExecutedTrade, amount: Size) {
        self.trades_executed += 1;
        self.config.current_daily_volume += amount.inner();
        if executed.had_errors() {
            self.note_error();
        } else {
            self.consecutive_errors = 0;
        }
    }

    fn note_error(&mut self) {
        self.consecutive_errors += 1;
        self.error_count += 1;
        mmsim_telemetry::Metrics::tick_error(&self.config.symbol);
    }

    fn skip(&self, reason: SkipReason) -> TickOutcome {
        mmsim_telemetry::Metrics::gate_skip(&self.config.symbol, reason.label());
        TickOutcome::Skipped(reason)
    }

    /// Observability gauges settle once per tick, after the outcome.
    fn record_gauges(&self, services: &SimServices, active_bots: usize) {
        let now = services.now_ms();
        let symbol = self.config.symbol.as_str();
        mmsim_telemetry::Metrics::active_bots(symbol, active_bots);
        mmsim_telemetry::Metrics::price(
            symbol,
            self.tracker.current().inner().to_f64().unwrap_or(0.0),
        );
        mmsim_telemetry::Metrics::breaker_open(symbol, self.breaker.is_tripped(now));
        mmsim_telemetry::Metrics::net_pressure(
            symbol,
            services
                .coordinator
                .pressure(self.config.id, now)
                .net_pressure
                .to_f64()
                .unwrap_or(0.0),
        );
    }

    /// Pause the market once the error streak exceeds [`MAX_CONSECUTIVE_ERRORS`].
    ///
    /// The resulting state is an ordinary pause with the same explicit
    /// resume path; only the error counters in the stats snapshot tell it
    /// apart from an operator pause.
    async fn check_degradation(&mut self, services: &SimServices) {
        if self.consecutive_errors > MAX_CONSECUTIVE_ERRORS
            && self.state == LifecycleState::Running
        {
            warn!(
                market = %self.config.symbol,
                failures = self.consecutive_errors,
                "error budget exhausted, pausing market"
            );
            let _ = self.pause(services, "error budget exhausted").await;
        }
    }

    async fn seed_book(&mut self, services: &SimServices, now_ms: u64) -> usize {
        let amount = Size::new((self.base_trade_amount() * dec!(2)).round_dp(8));
        let mut seeded = 0;
        for (side, bps) in SEED_LEVELS {
            let price = self
                .config
                .target_price
                .offset_bps(bps)
                .clamp_to(self.config.price_range_low, self.config.price_range_high);
            let placed = services
                .executor
                .place_order(BookOrder {
                    market: self.config.id,
                    side,
                    price,
                    amount,
                    at_ms: now_ms,
                })
                .await;
            match placed {
                Ok(id) => {
                    seeded += 1;
                    services
                        .executor
                        .announce(SimEvent::OrderPlaced {
                            market: self.config.symbol.clone(),
                            order_id: id.to_string(),
                            side,
                            price,
                            amount,
                            at_ms: now_ms,
                        })
                        .await;
                }
                Err(err) => {
                    warn!(
                        market = %self.config.symbol,
                        error = %err,
                        "book seed order failed"
                    );
                }
            }
        }
        debug!(market = %self.config.symbol, seeded, "order book seeded");
        seeded
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    #[cfg(test)]
    pub(crate) fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockConfigStore, MockEventSink, MockHistoryStore, MockOrderBook, OrderBook};
    use mmsim_core::{AggressionLevel, BotConfig, Clock, ManualClock, Personality, PoolBalances};
    use std::sync::Arc;

    fn test_config() -> MarketConfig {
        MarketConfig {
            id: MarketId::new(1),
            symbol: "AIX/USDT".to_string(),
            status: MarketStatus::Active,
            target_price: Price::new(dec!(100)),
            price_range_low: Price::new(dec!(95)),
            price_range_high: Price::new(dec!(105)),
            aggression: AggressionLevel::Aggressive,
            max_daily_volume: Decimal::ZERO,
            current_daily_volume: Decimal::ZERO,
            volatility_threshold: dec!(5),
            pause_on_high_volatility: false,
            real_liquidity_percent: Decimal::ZERO,
            pool: None,
            bots: vec![
                BotConfig::sample(BotId::generate(), Personality::Scalper),
                BotConfig::sample(BotId::generate(), Personality::MarketMaker),
            ],
        }
    }

    fn funded_pool() -> PoolBalances {
        PoolBalances {
            base_balance: Size::new(dec!(10_000)),
            quote_balance: dec!(1_000_000),
            tvl: dec!(2_000_000),
        }
    }

    fn services(
        clock: Arc<ManualClock>,
    ) -> (
        SimServices,
        Arc<MockOrderBook>,
        Arc<MockHistoryStore>,
        Arc<MockEventSink>,
    ) {
        let book = Arc::new(MockOrderBook::new());
        let history = Arc::new(MockHistoryStore::new());
        let events = Arc::new(MockEventSink::new());
        let svc = SimServices::new(book.clone(), history.clone(), events.clone(), clock);
        (svc, book, history, events)
    }

    #[tokio::test]
    async fn start_transitions_to_running_and_announces() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();

        assert_eq!(market.state(), LifecycleState::Initializing);
        market.start(&svc).await.unwrap();
        assert_eq!(market.state(), LifecycleState::Running);
        assert_eq!(events.count_kind("STATUS_CHANGE"), 1);
    }

    #[tokio::test]
    async fn start_twice_is_an_invalid_transition() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();

        market.start(&svc).await.unwrap();
        let err = market.start(&svc).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn start_restores_the_recorded_close_price() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, history, _events) = services(clock);
        history.set_last_close(MarketId::new(1), Price::new(dec!(102.5)));

        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();
        assert_eq!(market.current_price(), Price::new(dec!(102.5)));
    }

    #[tokio::test]
    async fn start_purges_leftover_orders() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, book, _history, _events) = services(clock);
        // An order abandoned by a previous run.
        book.place_order(BookOrder {
            market: MarketId::new(1),
            side: OrderSide::Buy,
            price: Price::new(dec!(99)),
            amount: Size::new(dec!(1)),
            at_ms: 0,
        })
        .await
        .unwrap();

        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();
        assert_eq!(book.placed_count(), 0);
    }

    #[tokio::test]
    async fn start_primes_sample_and_mirror() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, book, history, _events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();

        market.start(&svc).await.unwrap();
        assert_eq!(history.sample_count(), 1);
        assert_eq!(book.synced().len(), 1);
        assert_eq!(book.synced()[0].1, Price::new(dec!(100)));
    }

    #[tokio::test]
    async fn funded_pool_seeds_the_book_on_start() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, book, _history, events) = services(clock);
        let mut config = test_config();
        config.real_liquidity_percent = dec!(20);
        config.pool = Some(funded_pool());
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();

        market.start(&svc).await.unwrap();
        assert_eq!(book.placed_count(), 4);
        assert_eq!(events.count_kind("ORDER_PLACED"), 4);
        // 0.1% of base * 2 per seed level.
        assert_eq!(book.placed()[0].amount, Size::new(dec!(20)));
    }

    #[tokio::test]
    async fn rejected_seeding_leaves_the_market_errored() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, book, _history, _events) = services(clock);
        book.fail_placements(true);
        let mut config = test_config();
        config.real_liquidity_percent = dec!(20);
        config.pool = Some(funded_pool());
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();

        let err = market.start(&svc).await.unwrap_err();
        assert!(matches!(err, EngineError::Book(_)));
        assert_eq!(market.state(), LifecycleState::Error);

        // Operator recovery path.
        book.fail_placements(false);
        market.resume(&svc).await.unwrap();
        assert_eq!(market.state(), LifecycleState::Running);
    }

    #[tokio::test]
    async fn process_skips_when_not_running() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();

        let outcome = market.process(&svc, 6).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::NotRunning));
        assert!(!outcome.allows_bot_round());
    }

    #[tokio::test]
    async fn process_skips_below_min_active_bots() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        let outcome = market.process(&svc, 1).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::InsufficientBots));
    }

    #[tokio::test]
    async fn process_skips_on_volume_cap() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut config = test_config();
        config.max_daily_volume = dec!(100);
        config.current_daily_volume = dec!(100);
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        let outcome = market.process(&svc, 6).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::VolumeCapReached));
    }

    #[test]
    fn trades_shrink_to_remaining_cap_headroom() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut config = test_config();
        config.max_daily_volume = dec!(10);
        config.current_daily_volume = dec!(9.5);
        let market = MarketInstance::new(config, &svc, 42).unwrap();

        assert_eq!(
            market.cap_to_headroom(Size::new(dec!(2))),
            Size::new(dec!(0.5))
        );
        assert_eq!(
            market.cap_to_headroom(Size::new(dec!(0.3))),
            Size::new(dec!(0.3))
        );

        // No cap configured means no clamp.
        let uncapped = MarketInstance::new(test_config(), &svc, 42).unwrap();
        assert_eq!(
            uncapped.cap_to_headroom(Size::new(dec!(50))),
            Size::new(dec!(50))
        );
    }

    #[tokio::test]
    async fn process_skips_on_unfunded_pool() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut config = test_config();
        config.real_liquidity_percent = dec!(30);
        config.pool = Some(PoolBalances {
            base_balance: Size::new(Decimal::ZERO),
            quote_balance: Decimal::ZERO,
            tvl: Decimal::ZERO,
        });
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();
        // Bypass start so the unfunded pool is hit by the tick gate.
        market.force_state(LifecycleState::Running);

        let outcome = market.process(&svc, 6).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::PoolUnfunded));
    }

    #[tokio::test]
    async fn aggressive_market_trades_within_a_few_hundred_ticks() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, events) = services(clock.clone());
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        let mut traded = 0;
        for _ in 0..300 {
            clock.advance(1_000);
            if let TickOutcome::Traded { .. } = market.process(&svc, 6).await {
                traded += 1;
            }
        }
        // Aggressive trade probability is 0.30 per tick.
        assert!(traded > 30, "only {traded} trades in 300 ticks");
        assert!(events.count_kind("TRADE") >= traded);
        assert!(market.current_price() >= Price::new(dec!(95)));
        assert!(market.current_price() <= Price::new(dec!(105)));
    }

    #[tokio::test]
    async fn every_tenth_tick_samples_the_price() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, history, _events) = services(clock.clone());
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();
        assert_eq!(history.sample_count(), 1);

        for _ in 0..20 {
            clock.advance(1_000);
            market.process(&svc, 6).await;
        }
        // Start sample plus ticks 10 and 20.
        assert_eq!(history.sample_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_error_budget_pauses_like_an_operator() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, book, _history, _events) = services(clock.clone());
        let mut config = test_config();
        config.real_liquidity_percent = dec!(50);
        config.pool = Some(funded_pool());
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        // Placements start failing after a healthy start.
        book.fail_placements(true);
        for _ in 0..400 {
            clock.advance(1_000);
            market.process(&svc, 6).await;
            if market.state() != LifecycleState::Running {
                break;
            }
        }

        assert_eq!(market.state(), LifecycleState::Paused);
        let stats = market.stats(6, 6, clock.now_ms());
        assert!(stats.error_count > u64::from(MAX_CONSECUTIVE_ERRORS));

        // Same recovery path as a manual pause.
        book.fail_placements(false);
        market.resume(&svc).await.unwrap();
        assert_eq!(market.state(), LifecycleState::Running);
    }

    #[tokio::test]
    async fn status_changes_reach_the_config_store() {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = Arc::new(MockConfigStore::new());
        let (svc, _book, _history, _events) = services(clock);
        let svc = svc.with_config_store(store.clone());
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();

        market.start(&svc).await.unwrap();
        market.pause(&svc, "operator hold").await.unwrap();

        assert_eq!(
            store.saved_statuses(),
            vec![
                (MarketId::new(1), MarketStatus::Active),
                (MarketId::new(1), MarketStatus::Paused),
            ]
        );
        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].reason, "operator hold");
        assert_eq!(history[1].to, "PAUSED");
    }

    #[tokio::test]
    async fn tripped_breaker_blocks_ticks_until_resume() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock.clone());
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        market.breaker().trip(
            TripReason::Manual {
                message: "drill".to_string(),
            },
            clock.now_ms(),
        );
        let outcome = market.process(&svc, 6).await;
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::BreakerOpen));

        market.pause(&svc, "operator hold").await.unwrap();
        market.resume(&svc).await.unwrap();
        assert!(!market.breaker().is_tripped(clock.now_ms()));
    }

    #[tokio::test]
    async fn pause_keeps_resting_orders_and_emergency_stop_pulls_them() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, book, _history, _events) = services(clock);
        let mut config = test_config();
        config.real_liquidity_percent = dec!(50);
        config.pool = Some(funded_pool());
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        let resting = book.placed_count();
        assert!(resting > 0);

        market.pause(&svc, "operator hold").await.unwrap();
        assert_eq!(book.placed_count(), resting);

        market.resume(&svc).await.unwrap();
        market.emergency_stop(&svc, "drill").await.unwrap();
        assert_eq!(market.state(), LifecycleState::Paused);
        assert_eq!(book.placed_count(), 0);
    }

    #[tokio::test]
    async fn stop_is_terminal() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.start(&svc).await.unwrap();

        market.stop(&svc, "shutdown").await.unwrap();
        assert_eq!(market.state(), LifecycleState::Stopped);
        assert!(market.resume(&svc).await.is_err());
    }

    #[tokio::test]
    async fn update_config_preserves_daily_volume_and_id() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut market = MarketInstance::new(test_config(), &svc, 42).unwrap();
        market.force_state(LifecycleState::Running);

        let mut replacement = test_config();
        replacement.id = MarketId::new(99);
        replacement.target_price = Price::new(dec!(101));
        replacement.current_daily_volume = dec!(123);

        market.update_config(replacement).unwrap();
        assert_eq!(market.market_id(), MarketId::new(1));
        assert_eq!(market.config().target_price, Price::new(dec!(101)));
        assert_eq!(market.config().current_daily_volume, Decimal::ZERO);
    }

    #[tokio::test]
    async fn reset_daily_clears_the_volume_counter() {
        let clock = Arc::new(ManualClock::new(1_000));
        let (svc, _book, _history, _events) = services(clock);
        let mut config = test_config();
        config.current_daily_volume = dec!(500);
        let mut market = MarketInstance::new(config, &svc, 42).unwrap();

        market.reset_daily();
        assert_eq!(market.config().current_daily_volume, Decimal::ZERO);
    }

    #[test]
    fn lifecycle_transition_table() {
        use LifecycleState::*;
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(Running.can_transition_to(Error));
        assert!(Error.can_transition_to(Running));
        assert!(Paused.can_transition_to(Stopped));
        assert!(!Stopped.can_transition_to(Running));
        assert!(!Initializing.can_transition_to(Paused));
        assert!(!Stopped.can_transition_to(Error));
    }

    #[test]
    fn lifecycle_maps_to_store_status() {
        assert_eq!(
            LifecycleState::Running.as_market_status(),
            MarketStatus::Active
        );
        assert_eq!(
            LifecycleState::Error.as_market_status(),
            MarketStatus::Paused
        );
        assert_eq!(
            LifecycleState::Stopped.as_market_status(),
            MarketStatus::Stopped
        );
    }
}
