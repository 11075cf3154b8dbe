//! One simulated trader: a config contract plus a personality state machine.

use crate::context::MarketContext;
use crate::strategy::Strategy;
use crate::timing::TimingJitter;
use mmsim_core::{BotConfig, BotId, BotStatus, OrderSide, Personality, Price, Size, TradeDecision};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::trace;

/// A bot owns its [`BotConfig`] counters, its strategy state, and a seeded
/// RNG. Populations are deterministic for a given base seed.
pub struct Bot {
    config: BotConfig,
    strategy: Box<dyn Strategy>,
    rng: StdRng,
    jitter: TimingJitter,
    /// Next instant this bot may trade, jittered off the configured cooldown.
    ready_at_ms: u64,
}

impl Bot {
    pub fn new(config: BotConfig, strategy: Box<dyn Strategy>, seed: u64) -> Self {
        Self {
            config,
            strategy,
            rng: StdRng::seed_from_u64(seed),
            jitter: TimingJitter::default(),
            ready_at_ms: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> BotId {
        self.config.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn personality(&self) -> Personality {
        self.config.personality
    }

    #[must_use]
    pub fn status(&self) -> BotStatus {
        self.config.status
    }

    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Whether this bot may trade right now.
    ///
    /// Delegates the status/cap/cooldown contract to the config and adds
    /// the jittered readiness instant on top. Also flips an expired
    /// `Cooldown` status back to `Active`.
    pub fn can_trade(&mut self, now_ms: u64) -> bool {
        self.refresh_status(now_ms);
        self.config.can_trade(now_ms) && now_ms >= self.ready_at_ms
    }

    /// Ask the personality for a decision. `None` means sit this round out.
    pub fn decide(&mut self, ctx: &MarketContext) -> Option<TradeDecision> {
        self.strategy.decide_trade(&self.config, ctx, &mut self.rng)
    }

    /// Record an executed trade: counters, cooldown, strategy fill hook.
    pub fn on_trade_executed(&mut self, side: OrderSide, price: Price, amount: Size, now_ms: u64) {
        self.config.record_trade(now_ms);
        let cooldown = self.strategy.cooldown_ms(&self.config);
        self.ready_at_ms = now_ms + self.jitter.next_delay_ms(cooldown, &mut self.rng);
        if self.config.status == BotStatus::Active {
            self.config.status = BotStatus::Cooldown;
        }
        trace!(
            bot = %self.config.id,
            ready_at_ms = self.ready_at_ms,
            trades_today = self.config.daily_trade_count,
            "trade recorded"
        );
        self.strategy
            .on_fill(side, price, amount, now_ms, &mut self.rng);
    }

    /// Market started or resumed.
    pub fn activate(&mut self) {
        self.config.status = BotStatus::Active;
    }

    /// Market paused or stopped.
    pub fn pause(&mut self) {
        self.config.status = BotStatus::Paused;
    }

    /// Calendar-day rollover.
    pub fn reset_daily(&mut self) {
        self.config.reset_daily();
    }

    fn cooldown_elapsed(&self, now_ms: u64) -> bool {
        match self.config.last_trade_at_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.config.cooldown_ms(),
            None => true,
        }
    }

    fn refresh_status(&mut self, now_ms: u64) {
        if self.config.status == BotStatus::Cooldown
            && now_ms >= self.ready_at_ms
            && self.cooldown_elapsed(now_ms)
        {
            self.config.status = BotStatus::Active;
        }
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("id", &self.config.id)
            .field("personality", &self.config.personality)
            .field("status", &self.config.status)
            .field("ready_at_ms", &self.ready_at_ms)
            .finish()
    }
}
