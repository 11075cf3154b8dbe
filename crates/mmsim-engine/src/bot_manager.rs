//! Per-market bot roster and round scheduling.
//!
//! A round walks the roster in a fresh shuffled order, lets each ready
//! bot propose one decision and pushes it through coordination and
//! execution. Rounds are capped so a single tick can never flood the
//! tape.

use mmsim_core::{BotId, BotStatus, MarketId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

use mmsim_agents::Bot;

use crate::market_instance::{BotTradeOutcome, MarketInstance};
use crate::services::SimServices;

/// Most bot trades allowed in one round.
pub const MAX_TRADES_PER_ROUND: usize = 3;

/// Counters for one completed round.
///
/// `eligible` counts bots that produced a decision this round, so
/// `eligible == executed + rejected + skipped` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub eligible: usize,
    pub executed: usize,
    pub rejected: usize,
    pub skipped: usize,
}

/// The bots assigned to one market.
pub struct BotRoster {
    market: MarketId,
    bots: Vec<Bot>,
    round_seed: u64,
    rounds: u64,
}

impl BotRoster {
    #[must_use]
    pub fn new(market: MarketId, bots: Vec<Bot>, round_seed: u64) -> Self {
        Self {
            market,
            bots,
            round_seed,
            rounds: 0,
        }
    }

    #[must_use]
    pub fn market(&self) -> MarketId {
        self.market
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Bots currently participating, i.e. not manually paused. A bot in
    /// cooldown still counts: it holds inventory and will quote again.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.bots
            .iter()
            .filter(|b| b.status() != BotStatus::Paused)
            .count()
    }

    #[must_use]
    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    /// Pause one bot. Returns false when the id is not in this roster.
    pub fn pause_bot(&mut self, id: BotId) -> bool {
        match self.bots.iter_mut().find(|b| b.id() == id) {
            Some(bot) => {
                bot.pause();
                true
            }
            None => false,
        }
    }

    /// Reactivate one bot. Returns false when the id is not in this roster.
    pub fn activate_bot(&mut self, id: BotId) -> bool {
        match self.bots.iter_mut().find(|b| b.id() == id) {
            Some(bot) => {
                bot.activate();
                true
            }
            None => false,
        }
    }

    pub fn pause_all(&mut self) {
        for bot in &mut self.bots {
            bot.pause();
        }
    }

    pub fn activate_all(&mut self) {
        for bot in &mut self.bots {
            bot.activate();
        }
    }

    /// Midnight rollover: clear every bot's daily trade counter.
    pub fn reset_daily(&mut self) {
        for bot in &mut self.bots {
            bot.reset_daily();
        }
    }

    /// Run one decision round against the market.
    ///
    /// Visit order is reshuffled every round so early roster positions
    /// get no standing priority once the trade cap bites.
    pub async fn run_round(
        &mut self,
        instance: &mut MarketInstance,
        services: &SimServices,
    ) -> RoundSummary {
        let now = services.now_ms();
        let ctx = instance.market_context(services, now);
        self.rounds += 1;

        let mut order: Vec<usize> = (0..self.bots.len()).collect();
        let mut rng = StdRng::seed_from_u64(
            self.round_seed ^ self.rounds.wrapping_mul(0x5851_F42D_4C95_7F2D),
        );
        order.shuffle(&mut rng);

        let mut summary = RoundSummary::default();
        for idx in order {
            if summary.executed >= MAX_TRADES_PER_ROUND {
                break;
            }
            let bot = &mut self.bots[idx];
            if !bot.can_trade(now) {
                continue;
            }
            let Some(decision) = bot.decide(&ctx) else {
                continue;
            };
            summary.eligible += 1;
            match instance.execute_bot_decision(services, bot, decision).await {
                BotTradeOutcome::Executed { .. } => summary.executed += 1,
                BotTradeOutcome::Rejected { .. } => summary.rejected += 1,
                BotTradeOutcome::Skipped(_) => summary.skipped += 1,
            }
        }

        trace!(
            market = %self.market,
            round = self.rounds,
            eligible = summary.eligible,
            executed = summary.executed,
            rejected = summary.rejected,
            "bot round complete"
        );
        summary
    }
}
