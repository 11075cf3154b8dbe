//! Builds bots and whole populations from configs.

use crate::bot::Bot;
use crate::personality::build_strategy;
use mmsim_core::{BotConfig, BotId, MarketId, Personality, Result};
use tracing::debug;

/// Default population mix for a market created without explicit bots.
const DEFAULT_MIX: [Personality; 6] = [
    Personality::Scalper,
    Personality::Scalper,
    Personality::Swing,
    Personality::Accumulator,
    Personality::Distributor,
    Personality::MarketMaker,
];

/// Turns validated [`BotConfig`]s into live [`Bot`]s.
///
/// Each bot's RNG seed is derived from the factory's base seed, the market
/// id, and the bot id, so no two bots share a stream and rebuilding the
/// same config replays the same decisions.
#[derive(Debug, Clone, Copy)]
pub struct BotFactory {
    base_seed: u64,
}

impl BotFactory {
    #[must_use]
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Validate a config and wire it to its personality strategy.
    pub fn build(&self, market: MarketId, config: BotConfig) -> Result<Bot> {
        config.validate()?;
        let seed = derive_seed(self.base_seed, market, &config.id);
        let strategy = build_strategy(config.personality);
        Ok(Bot::new(config, strategy, seed))
    }

    /// Build every config in order, failing on the first invalid one.
    pub fn build_population(&self, market: MarketId, configs: Vec<BotConfig>) -> Result<Vec<Bot>> {
        let bots = configs
            .into_iter()
            .map(|config| self.build(market, config))
            .collect::<Result<Vec<_>>>()?;
        debug!(market = %market, bots = bots.len(), "population built");
        Ok(bots)
    }

    /// Standard mix for a market configured without bots:
    /// two scalpers, one swing, one accumulator, one distributor,
    /// one market maker.
    #[must_use]
    pub fn default_population() -> Vec<BotConfig> {
        DEFAULT_MIX
            .iter()
            .map(|&personality| BotConfig::sample(BotId::generate(), personality))
            .collect()
    }
}

impl Default for BotFactory {
    fn default() -> Self {
        Self::new(0)
    }
}

fn derive_seed(base: u64, market: MarketId, bot: &BotId) -> u64 {
    let uuid_bits = bot.as_uuid().as_u128() as u64;
    base ^ market.0.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ uuid_bits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MarketContext;
    use mmsim_core::Price;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn ctx() -> MarketContext {
        MarketContext {
            market_id: MarketId(1),
            current_price: Price::new(dec!(100)),
            target_price: Price::new(dec!(100)),
            range_low: Price::new(dec!(95)),
            range_high: Price::new(dec!(105)),
            volatility_pct: dec!(0.5),
            change_pct: Decimal::ZERO,
            micro_change_pct: Decimal::ZERO,
            book_top: None,
            recommended_side: None,
            now_ms: 0,
        }
    }

    #[test]
    fn default_population_mix() {
        let configs = BotFactory::default_population();
        assert_eq!(configs.len(), 6);

        let count = |p: Personality| configs.iter().filter(|c| c.personality == p).count();
        assert_eq!(count(Personality::Scalper), 2);
        assert_eq!(count(Personality::Swing), 1);
        assert_eq!(count(Personality::Accumulator), 1);
        assert_eq!(count(Personality::Distributor), 1);
        assert_eq!(count(Personality::MarketMaker), 1);
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = BotConfig::sample(BotId::generate(), Personality::Scalper);
        config.risk_tolerance = dec!(2);

        let factory = BotFactory::new(7);
        assert!(factory.build(MarketId(1), config).is_err());
    }

    #[test]
    fn same_seed_replays_identically() {
        let id = BotId::from_uuid(Uuid::from_u128(0xABCD));
        let config = BotConfig::sample(id, Personality::MarketMaker);

        let mut a = BotFactory::new(99)
            .build(MarketId(3), config.clone())
            .unwrap();
        let mut b = BotFactory::new(99).build(MarketId(3), config).unwrap();

        let c = ctx();
        for _ in 0..10 {
            assert_eq!(a.decide(&c), b.decide(&c));
        }
    }

    #[test]
    fn different_bots_get_different_streams() {
        let factory = BotFactory::new(99);
        let c = ctx();

        let mut a = factory
            .build(
                MarketId(3),
                BotConfig::sample(BotId::from_uuid(Uuid::from_u128(1)), Personality::MarketMaker),
            )
            .unwrap();
        let mut b = factory
            .build(
                MarketId(3),
                BotConfig::sample(BotId::from_uuid(Uuid::from_u128(2)), Personality::MarketMaker),
            )
            .unwrap();

        let a_prices: Vec<_> = (0..10).filter_map(|_| a.decide(&c)).map(|d| d.price).collect();
        let b_prices: Vec<_> = (0..10).filter_map(|_| b.decide(&c)).map(|d| d.price).collect();
        assert_ne!(a_prices, b_prices);
    }
}
