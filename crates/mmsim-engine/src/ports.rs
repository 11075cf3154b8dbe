//! Outbound ports: config store, order book, trade history, event sink.
//!
//! The engine core never talks to an exchange, database, or message bus
//! directly. It goes through these traits so tests (and dry runs) can swap
//! in the in-memory mocks at the bottom of this module.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use mmsim_core::{
    BookTop, BotId, MarketConfig, MarketId, MarketStatus, OrderId, OrderKind, OrderSide, Price,
    Size, TradePurpose,
};
use rust_decimal::Decimal;

use crate::error::{EngineError, Result};
use crate::events::SimEvent;

/// Boxed future for dyn-compatible async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An order handed to the real book.
#[derive(Debug, Clone, PartialEq)]
pub struct BookOrder {
    pub market: MarketId,
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
    pub at_ms: u64,
}

/// A completed trade, as persisted to history.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub market: MarketId,
    pub side: OrderSide,
    pub price: Price,
    pub amount: Size,
    pub notional: Decimal,
    pub purpose: TradePurpose,
    pub kind: OrderKind,
    pub bot: Option<BotId>,
    pub at_ms: u64,
}

/// A point on a market's price history curve.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    pub market: MarketId,
    pub price: Price,
    pub at_ms: u64,
}

/// Audit entry for a market lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeRecord {
    pub market: MarketId,
    pub from: String,
    pub to: String,
    pub reason: String,
    pub at_ms: u64,
}

/// Configuration persistence.
///
/// Configs are authored outside the engine; the engine reads them on
/// registration and after daily resets, and writes back status changes so
/// operator tooling sees what the loop decided.
pub trait ConfigStore: Send + Sync {
    /// Load the stored config for a market, `None` when unknown.
    fn load_market_config<'a>(
        &'a self,
        market: MarketId,
    ) -> BoxFuture<'a, Result<Option<MarketConfig>>>;

    /// Persist the market's coarse status.
    fn save_status<'a>(&'a self, market: MarketId, status: MarketStatus)
        -> BoxFuture<'a, Result<()>>;

    /// Append a lifecycle transition to the market's audit trail.
    fn append_history<'a>(&'a self, record: StatusChangeRecord) -> BoxFuture<'a, Result<()>>;
}

/// Real order book access for the non-AI liquidity share.
pub trait OrderBook: Send + Sync {
    /// Place a limit order, returning its id.
    fn place_order<'a>(&'a self, order: BookOrder) -> BoxFuture<'a, Result<OrderId>>;

    /// Cancel one resting order by id.
    fn cancel_order<'a>(&'a self, market: MarketId, order: OrderId) -> BoxFuture<'a, Result<()>>;

    /// Best bid/ask for a market, `None` when the book is empty.
    fn book_top<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<Option<BookTop>>>;

    /// Update the displayed liquidity mirror at a price level. The AI-only
    /// share never rests on the book, this is how it stays visible.
    fn sync_visible_liquidity<'a>(
        &'a self,
        market: MarketId,
        price: Price,
        amount: Size,
    ) -> BoxFuture<'a, Result<()>>;

    /// Cancel everything this engine has resting on a market.
    /// Returns the number of cancelled orders.
    fn cancel_market_orders<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<u32>>;
}

/// Append-only trade and price history.
pub trait HistoryStore: Send + Sync {
    fn record_trade<'a>(&'a self, record: TradeRecord) -> BoxFuture<'a, Result<()>>;

    fn record_price_sample<'a>(&'a self, sample: PriceSample) -> BoxFuture<'a, Result<()>>;

    /// Most recent trades for a market, newest first.
    fn recent_trades<'a>(
        &'a self,
        market: MarketId,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TradeRecord>>>;

    /// Last recorded closing price, `None` for a market with no history.
    fn last_close_price<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<Option<Price>>>;
}

/// Event fan-out to activity feeds and dashboards.
pub trait EventSink: Send + Sync {
    fn publish<'a>(&'a self, event: SimEvent) -> BoxFuture<'a, Result<()>>;
}

pub type DynConfigStore = Arc<dyn ConfigStore>;
pub type DynOrderBook = Arc<dyn OrderBook>;
pub type DynHistoryStore = Arc<dyn HistoryStore>;
pub type DynEventSink = Arc<dyn EventSink>;

// ============================================================================
// In-memory implementations
// ============================================================================

/// In-memory order book: records placements, serves a configurable top.
///
/// Used by tests and by dry-run deployments where no real book exists.
#[derive(Default)]
pub struct MockOrderBook {
    placed: parking_lot::Mutex<Vec<(OrderId, BookOrder)>>,
    synced: parking_lot::Mutex<Vec<(MarketId, Price, Size)>>,
    top: parking_lot::Mutex<Option<BookTop>>,
    fail_placements: parking_lot::Mutex<bool>,
}

impl MockOrderBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_top(&self, top: Option<BookTop>) {
        *self.top.lock() = top;
    }

    /// Make every subsequent placement fail, for error-path tests.
    pub fn fail_placements(&self, fail: bool) {
        *self.fail_placements.lock() = fail;
    }

    #[must_use]
    pub fn placed(&self) -> Vec<BookOrder> {
        self.placed.lock().iter().map(|(_, o)| o.clone()).collect()
    }

    #[must_use]
    pub fn placed_count(&self) -> usize {
        self.placed.lock().len()
    }

    /// Every `sync_visible_liquidity` call, in order.
    #[must_use]
    pub fn synced(&self) -> Vec<(MarketId, Price, Size)> {
        self.synced.lock().clone()
    }
}

impl OrderBook for MockOrderBook {
    fn place_order<'a>(&'a self, order: BookOrder) -> BoxFuture<'a, Result<OrderId>> {
        Box::pin(async move {
            if *self.fail_placements.lock() {
                return Err(EngineError::Book("placement refused".to_string()));
            }
            let id = OrderId::generate();
            self.placed.lock().push((id, order));
            Ok(id)
        })
    }

    fn cancel_order<'a>(&'a self, _market: MarketId, order: OrderId) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut placed = self.placed.lock();
            let before = placed.len();
            placed.retain(|(id, _)| *id != order);
            if placed.len() == before {
                return Err(EngineError::Book(format!("unknown order {order}")));
            }
            Ok(())
        })
    }

    fn book_top<'a>(&'a self, _market: MarketId) -> BoxFuture<'a, Result<Option<BookTop>>> {
        Box::pin(async move { Ok(*self.top.lock()) })
    }

    fn sync_visible_liquidity<'a>(
        &'a self,
        market: MarketId,
        price: Price,
        amount: Size,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.synced.lock().push((market, price, amount));
            Ok(())
        })
    }

    fn cancel_market_orders<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<u32>> {
        Box::pin(async move {
            let mut placed = self.placed.lock();
            let before = placed.len();
            placed.retain(|(_, o)| o.market != market);
            Ok((before - placed.len()) as u32)
        })
    }
}

/// In-memory trade and price history.
#[derive(Default)]
pub struct MockHistoryStore {
    records: parking_lot::Mutex<Vec<TradeRecord>>,
    samples: parking_lot::Mutex<Vec<PriceSample>>,
    closes: parking_lot::Mutex<HashMap<MarketId, Price>>,
    fail_writes: parking_lot::Mutex<bool>,
}

impl MockHistoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for error-budget tests.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    /// Preset a closing price, as if a previous run recorded one.
    pub fn set_last_close(&self, market: MarketId, price: Price) {
        self.closes.lock().insert(market, price);
    }

    #[must_use]
    pub fn records(&self) -> Vec<TradeRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }
}

impl HistoryStore for MockHistoryStore {
    fn record_trade<'a>(&'a self, record: TradeRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if *self.fail_writes.lock() {
                return Err(EngineError::History("write refused".to_string()));
            }
            self.records.lock().push(record);
            Ok(())
        })
    }

    fn record_price_sample<'a>(&'a self, sample: PriceSample) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if *self.fail_writes.lock() {
                return Err(EngineError::History("write refused".to_string()));
            }
            self.samples.lock().push(sample);
            Ok(())
        })
    }

    fn recent_trades<'a>(
        &'a self,
        market: MarketId,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TradeRecord>>> {
        Box::pin(async move {
            let records = self.records.lock();
            Ok(records
                .iter()
                .rev()
                .filter(|r| r.market == market)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn last_close_price<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<Option<Price>>> {
        Box::pin(async move {
            if let Some(price) = self.closes.lock().get(&market) {
                return Ok(Some(*price));
            }
            let records = self.records.lock();
            Ok(records
                .iter()
                .rev()
                .find(|r| r.market == market)
                .map(|r| r.price))
        })
    }
}

/// In-memory config store backed by a map.
#[derive(Default)]
pub struct MockConfigStore {
    configs: parking_lot::Mutex<HashMap<MarketId, MarketConfig>>,
    statuses: parking_lot::Mutex<Vec<(MarketId, MarketStatus)>>,
    history: parking_lot::Mutex<Vec<StatusChangeRecord>>,
}

impl MockConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_config(&self, config: MarketConfig) {
        self.configs.lock().insert(config.id, config);
    }

    #[must_use]
    pub fn saved_statuses(&self) -> Vec<(MarketId, MarketStatus)> {
        self.statuses.lock().clone()
    }

    #[must_use]
    pub fn history(&self) -> Vec<StatusChangeRecord> {
        self.history.lock().clone()
    }
}

impl ConfigStore for MockConfigStore {
    fn load_market_config<'a>(
        &'a self,
        market: MarketId,
    ) -> BoxFuture<'a, Result<Option<MarketConfig>>> {
        Box::pin(async move { Ok(self.configs.lock().get(&market).cloned()) })
    }

    fn save_status<'a>(
        &'a self,
        market: MarketId,
        status: MarketStatus,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.statuses.lock().push((market, status));
            Ok(())
        })
    }

    fn append_history<'a>(&'a self, record: StatusChangeRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.history.lock().push(record);
            Ok(())
        })
    }
}

/// In-memory event sink.
#[derive(Default)]
pub struct MockEventSink {
    events: parking_lot::Mutex<Vec<SimEvent>>,
}

impl MockEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for MockEventSink {
    fn publish<'a>(&'a self, event: SimEvent) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.events.lock().push(event);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(market: u64) -> BookOrder {
        BookOrder {
            market: MarketId(market),
            side: OrderSide::Buy,
            price: Price::new(dec!(100)),
            amount: Size::new(dec!(5)),
            at_ms: 0,
        }
    }

    fn record(market: u64, price: Decimal, at_ms: u64) -> TradeRecord {
        TradeRecord {
            market: MarketId(market),
            side: OrderSide::Buy,
            price: Price::new(price),
            amount: Size::new(dec!(1)),
            notional: price,
            purpose: TradePurpose::Liquidity,
            kind: OrderKind::AiOnly,
            bot: None,
            at_ms,
        }
    }

    #[tokio::test]
    async fn mock_book_records_and_cancels() {
        let book = MockOrderBook::new();
        let first = book.place_order(order(1)).await.unwrap();
        book.place_order(order(1)).await.unwrap();
        book.place_order(order(2)).await.unwrap();
        assert_eq!(book.placed_count(), 3);

        book.cancel_order(MarketId(1), first).await.unwrap();
        assert_eq!(book.placed_count(), 2);
        assert!(book.cancel_order(MarketId(1), first).await.is_err());

        let cancelled = book.cancel_market_orders(MarketId(1)).await.unwrap();
        assert_eq!(cancelled, 1);
        assert_eq!(book.placed_count(), 1);
    }

    #[tokio::test]
    async fn mock_book_failure_mode() {
        let book = MockOrderBook::new();
        book.fail_placements(true);
        let err = book.place_order(order(1)).await;
        assert!(matches!(err, Err(EngineError::Book(_))));
        assert_eq!(book.placed_count(), 0);
    }

    #[tokio::test]
    async fn mock_history_serves_recent_and_close() {
        let history = MockHistoryStore::new();
        history.record_trade(record(1, dec!(100), 10)).await.unwrap();
        history.record_trade(record(2, dec!(50), 20)).await.unwrap();
        history.record_trade(record(1, dec!(101), 30)).await.unwrap();

        let recent = history.recent_trades(MarketId(1), 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        // Newest first.
        assert_eq!(recent[0].at_ms, 30);

        let close = history.last_close_price(MarketId(1)).await.unwrap();
        assert_eq!(close, Some(Price::new(dec!(101))));
        assert_eq!(
            history.last_close_price(MarketId(9)).await.unwrap(),
            None
        );

        history.set_last_close(MarketId(9), Price::new(dec!(7)));
        assert_eq!(
            history.last_close_price(MarketId(9)).await.unwrap(),
            Some(Price::new(dec!(7)))
        );
    }

    #[tokio::test]
    async fn mock_history_failure_mode() {
        let history = MockHistoryStore::new();
        history.fail_writes(true);
        assert!(history.record_trade(record(1, dec!(100), 10)).await.is_err());
        assert!(history
            .record_price_sample(PriceSample {
                market: MarketId(1),
                price: Price::new(dec!(100)),
                at_ms: 10,
            })
            .await
            .is_err());
        assert_eq!(history.record_count(), 0);
        assert_eq!(history.sample_count(), 0);
    }

    #[tokio::test]
    async fn mock_config_store_round_trips() {
        let store = MockConfigStore::new();
        assert!(store
            .load_market_config(MarketId(1))
            .await
            .unwrap()
            .is_none());

        store
            .save_status(MarketId(1), MarketStatus::Paused)
            .await
            .unwrap();
        store
            .append_history(StatusChangeRecord {
                market: MarketId(1),
                from: "RUNNING".to_string(),
                to: "PAUSED".to_string(),
                reason: "operator hold".to_string(),
                at_ms: 5,
            })
            .await
            .unwrap();

        assert_eq!(store.saved_statuses(), vec![(MarketId(1), MarketStatus::Paused)]);
        assert_eq!(store.history().len(), 1);
    }

    #[tokio::test]
    async fn mock_sink_counts_kinds() {
        let sink = MockEventSink::new();
        sink.publish(SimEvent::StatusChange {
            market: "mkt-1".to_string(),
            from: "INITIALIZING".to_string(),
            to: "RUNNING".to_string(),
            reason: "started".to_string(),
            at_ms: 0,
        })
        .await
        .unwrap();

        assert_eq!(sink.count_kind("STATUS_CHANGE"), 1);
        assert_eq!(sink.count_kind("TRADE"), 0);
    }
}
