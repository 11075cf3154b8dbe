//! End-to-end simulation runs against the public engine API.
//!
//! Covers the long-horizon invariants:
//! - Trades actually happen with the default bot mix
//! - The simulated price never leaves the configured range
//! - A finite daily volume cap is respected
//! - Daily reset reopens a capped market

use std::sync::Arc;

use mmsim_core::{AggressionLevel, ManualClock, MarketConfig, MarketId, MarketStatus, Price};
use mmsim_engine::{
    LifecycleState, MockEventSink, MockHistoryStore, MockOrderBook, SimServices, SimulationEngine,
    SkipReason, TickOutcome,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn market_config(id: u64) -> MarketConfig {
    MarketConfig {
        id: MarketId::new(id),
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
        bots: Vec::new(),
    }
}

fn engine() -> (SimulationEngine, Arc<ManualClock>, Arc<MockEventSink>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let events = Arc::new(MockEventSink::new());
    let services = SimServices::new(
        Arc::new(MockOrderBook::new()),
        Arc::new(MockHistoryStore::new()),
        events.clone(),
        clock.clone(),
    );
    let engine = SimulationEngine::new(services).with_seed(7);
    (engine, clock, events)
}

/// A thousand ticks with the default six-bot mix: trades happen and the
/// price stays inside [95, 105] the whole way.
#[tokio::test]
async fn test_thousand_ticks_trade_and_hold_the_range() {
    let (engine, clock, events) = engine();
    let id = engine.add_market(market_config(1)).unwrap();
    engine.start_market(id).await.unwrap();

    let low = Price::new(dec!(95));
    let high = Price::new(dec!(105));
    for tick in 0..1_000 {
        clock.advance(1_000);
        engine.tick_market(id).await.unwrap();

        let stats = engine.market_stats(id).await.unwrap();
        assert!(
            stats.current_price >= low && stats.current_price <= high,
            "price {} left the range on tick {tick}",
            stats.current_price
        );
    }

    let stats = engine.market_stats(id).await.unwrap();
    assert_eq!(stats.state, LifecycleState::Running);
    assert!(stats.tick_count >= 1_000);
    assert!(stats.trades_executed > 0, "no trades over 1000 ticks");
    assert!(stats.error_count == 0, "clean run recorded errors");
    assert!(events.count_kind("TRADE") > 0);

    engine.stop_market(id, "test done").await.unwrap();
}

/// A finite daily cap is never exceeded, and once the market saturates
/// every further tick reports the volume gate.
#[tokio::test]
async fn test_finite_daily_volume_cap_binds() {
    let (engine, clock, _events) = engine();
    let mut config = market_config(1);
    config.max_daily_volume = dec!(120);
    let id = engine.add_market(config).unwrap();
    engine.start_market(id).await.unwrap();

    let mut saw_cap_skip = false;
    for _ in 0..1_000 {
        clock.advance(1_000);
        let outcome = engine.tick_market(id).await.unwrap();
        if matches!(outcome, TickOutcome::Skipped(SkipReason::VolumeCapReached)) {
            saw_cap_skip = true;
        }

        let stats = engine.market_stats(id).await.unwrap();
        assert!(
            stats.daily_volume <= dec!(120),
            "daily volume {} exceeded the cap",
            stats.daily_volume
        );
    }

    assert!(saw_cap_skip, "cap never bound over 1000 aggressive ticks");

    engine.stop_market(id, "test done").await.unwrap();
}

/// Daily reset zeroes the accumulated volume so a capped market trades
/// again the next day.
#[tokio::test]
async fn test_daily_reset_reopens_a_capped_market() {
    let (engine, clock, _events) = engine();
    let mut config = market_config(1);
    config.max_daily_volume = dec!(40);
    let id = engine.add_market(config).unwrap();
    engine.start_market(id).await.unwrap();

    // Saturate the cap.
    let mut capped = false;
    for _ in 0..1_000 {
        clock.advance(1_000);
        let outcome = engine.tick_market(id).await.unwrap();
        if matches!(outcome, TickOutcome::Skipped(SkipReason::VolumeCapReached)) {
            capped = true;
            break;
        }
    }
    assert!(capped, "market never hit the 40-unit cap");

    engine.reset_daily().await;
    let stats = engine.market_stats(id).await.unwrap();
    assert_eq!(stats.daily_volume, Decimal::ZERO);

    // The next ticks are allowed to trade again.
    let mut reopened = false;
    for _ in 0..200 {
        clock.advance(1_000);
        let outcome = engine.tick_market(id).await.unwrap();
        if !matches!(outcome, TickOutcome::Skipped(SkipReason::VolumeCapReached)) {
            reopened = true;
        }
        if engine.market_stats(id).await.unwrap().daily_volume > Decimal::ZERO {
            break;
        }
    }
    assert!(reopened, "volume gate still closed after daily reset");

    engine.stop_market(id, "test done").await.unwrap();
}

/// The price sample cadence holds over a long run: one sample at start,
/// then one every tenth tick.
#[tokio::test]
async fn test_price_samples_land_every_tenth_tick() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let history = Arc::new(MockHistoryStore::new());
    let services = SimServices::new(
        Arc::new(MockOrderBook::new()),
        history.clone(),
        Arc::new(MockEventSink::new()),
        clock.clone(),
    );
    let engine = SimulationEngine::new(services).with_seed(7);
    let id = engine.add_market(market_config(1)).unwrap();
    engine.start_market(id).await.unwrap();

    for _ in 0..100 {
        clock.advance(1_000);
        engine.tick_market(id).await.unwrap();
    }

    // 1 start sample + 10 cadence samples over 100 ticks.
    assert_eq!(history.sample_count(), 11);

    engine.stop_market(id, "test done").await.unwrap();
}
