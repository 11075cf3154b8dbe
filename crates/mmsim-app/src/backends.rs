//! In-memory backends behind the engine's ports.
//!
//! The simulator has no exchange, database or message bus. These are the
//! production implementations the binary wires in: a resting-order book,
//! a bounded trade/price history, an event sink that writes to the log,
//! and a config store that re-reads the TOML file for daily reloads.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use mmsim_core::{BookTop, MarketConfig, MarketId, MarketStatus, OrderId, OrderSide, Price, Size};
use mmsim_engine::error::Result;
use mmsim_engine::ports::{
    BookOrder, BoxFuture, ConfigStore, EventSink, HistoryStore, OrderBook, PriceSample,
    StatusChangeRecord, TradeRecord,
};
use mmsim_engine::{EngineError, SimEvent};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::AppConfig;

/// Trades kept per market before the oldest fall off.
const TRADE_CAP: usize = 10_000;

/// Price samples kept per market, roughly a day at the sampling cadence.
const SAMPLE_CAP: usize = 8_640;

/// Lifecycle audit records kept per store.
const STATUS_HISTORY_CAP: usize = 1_000;

/// In-memory order book holding the engine's resting orders.
///
/// The top of book is derived from what actually rests, so the seeded
/// spread placed at market start is what callers see.
#[derive(Default)]
pub struct SimOrderBook {
    orders: Mutex<HashMap<OrderId, BookOrder>>,
    visible: Mutex<HashMap<MarketId, (Price, Size)>>,
}

impl SimOrderBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders currently resting on one market.
    #[must_use]
    pub fn resting(&self, market: MarketId) -> usize {
        self.orders
            .lock()
            .values()
            .filter(|o| o.market == market)
            .count()
    }

    /// Displayed liquidity mirror for one market.
    #[must_use]
    pub fn visible(&self, market: MarketId) -> Option<(Price, Size)> {
        self.visible.lock().get(&market).copied()
    }
}

impl OrderBook for SimOrderBook {
    fn place_order<'a>(&'a self, order: BookOrder) -> BoxFuture<'a, Result<OrderId>> {
        Box::pin(async move {
            let id = OrderId::generate();
            self.orders.lock().insert(id, order);
            Ok(id)
        })
    }

    fn cancel_order<'a>(&'a self, market: MarketId, order: OrderId) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.orders.lock().remove(&order) {
                Some(_) => Ok(()),
                None => Err(EngineError::Book(format!(
                    "unknown order {order} on {market}"
                ))),
            }
        })
    }

    fn book_top<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<Option<BookTop>>> {
        Box::pin(async move {
            let orders = self.orders.lock();
            let mut bid: Option<Price> = None;
            let mut ask: Option<Price> = None;
            for order in orders.values().filter(|o| o.market == market) {
                match order.side {
                    OrderSide::Buy => bid = Some(bid.map_or(order.price, |b| b.max(order.price))),
                    OrderSide::Sell => ask = Some(ask.map_or(order.price, |a| a.min(order.price))),
                }
            }
            if bid.is_none() && ask.is_none() {
                return Ok(None);
            }
            // A one-sided book reports zero for the missing side;
            // BookTop::mid treats that as "no midpoint".
            Ok(Some(BookTop::new(
                bid.unwrap_or(Price::ZERO),
                ask.unwrap_or(Price::ZERO),
            )))
        })
    }

    fn sync_visible_liquidity<'a>(
        &'a self,
        market: MarketId,
        price: Price,
        amount: Size,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.visible.lock().insert(market, (price, amount));
            Ok(())
        })
    }

    fn cancel_market_orders<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<u32>> {
        Box::pin(async move {
            let mut orders = self.orders.lock();
            let before = orders.len();
            orders.retain(|_, o| o.market != market);
            Ok((before - orders.len()) as u32)
        })
    }
}

/// Bounded in-memory trade and price history.
///
/// Ring semantics per market: once a cap is hit the oldest record drops,
/// so a long-running simulation holds steady memory.
#[derive(Default)]
pub struct RingHistory {
    trades: Mutex<HashMap<MarketId, VecDeque<TradeRecord>>>,
    samples: Mutex<HashMap<MarketId, VecDeque<PriceSample>>>,
}

impl RingHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trade_count(&self, market: MarketId) -> usize {
        self.trades.lock().get(&market).map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn sample_count(&self, market: MarketId) -> usize {
        self.samples.lock().get(&market).map_or(0, VecDeque::len)
    }
}

impl HistoryStore for RingHistory {
    fn record_trade<'a>(&'a self, record: TradeRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut trades = self.trades.lock();
            let ring = trades.entry(record.market).or_default();
            ring.push_back(record);
            if ring.len() > TRADE_CAP {
                ring.pop_front();
            }
            Ok(())
        })
    }

    fn record_price_sample<'a>(&'a self, sample: PriceSample) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut samples = self.samples.lock();
            let ring = samples.entry(sample.market).or_default();
            ring.push_back(sample);
            if ring.len() > SAMPLE_CAP {
                ring.pop_front();
            }
            Ok(())
        })
    }

    fn recent_trades<'a>(
        &'a self,
        market: MarketId,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<TradeRecord>>> {
        Box::pin(async move {
            let trades = self.trades.lock();
            let Some(ring) = trades.get(&market) else {
                return Ok(Vec::new());
            };
            Ok(ring.iter().rev().take(limit).cloned().collect())
        })
    }

    fn last_close_price<'a>(&'a self, market: MarketId) -> BoxFuture<'a, Result<Option<Price>>> {
        Box::pin(async move {
            let last_sample = self
                .samples
                .lock()
                .get(&market)
                .and_then(|ring| ring.back().map(|s| (s.at_ms, s.price)));
            let last_trade = self
                .trades
                .lock()
                .get(&market)
                .and_then(|ring| ring.back().map(|t| (t.at_ms, t.price)));
            // Whichever record is freshest is the closing price.
            let close = match (last_sample, last_trade) {
                (Some((sa, sp)), Some((ta, tp))) => Some(if sa >= ta { sp } else { tp }),
                (Some((_, p)), None) | (None, Some((_, p))) => Some(p),
                (None, None) => None,
            };
            Ok(close)
        })
    }
}

/// Event sink that writes every event to the log as JSON.
///
/// Dashboards are out of scope for the binary; the structured log line
/// is the activity feed.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn publish<'a>(&'a self, event: SimEvent) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match serde_json::to_string(&event) {
                Ok(payload) => debug!(target: "mmsim::event", kind = event.kind(), %payload),
                Err(e) => debug!(target: "mmsim::event", kind = event.kind(), error = %e, "event not serializable"),
            }
            Ok(())
        })
    }
}

/// Config store backed by the application's TOML file.
///
/// `load_market_config` re-reads the file on every call, so edits made
/// while the simulator runs land at the next daily reset. Status writes
/// stay in memory; the file is operator-owned and never written.
pub struct FileConfigStore {
    path: PathBuf,
    statuses: Mutex<HashMap<MarketId, MarketStatus>>,
    history: Mutex<VecDeque<StatusChangeRecord>>,
}

impl FileConfigStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            statuses: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Last status the engine reported for a market.
    #[must_use]
    pub fn status(&self, market: MarketId) -> Option<MarketStatus> {
        self.statuses.lock().get(&market).copied()
    }

    #[must_use]
    pub fn status_history(&self) -> Vec<StatusChangeRecord> {
        self.history.lock().iter().cloned().collect()
    }
}

impl ConfigStore for FileConfigStore {
    fn load_market_config<'a>(
        &'a self,
        market: MarketId,
    ) -> BoxFuture<'a, Result<Option<MarketConfig>>> {
        Box::pin(async move {
            let content = tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|e| EngineError::Store(format!("read {}: {e}", self.path.display())))?;
            let config: AppConfig = toml::from_str(&content)
                .map_err(|e| EngineError::Store(format!("parse {}: {e}", self.path.display())))?;
            Ok(config
                .markets
                .iter()
                .find(|seed| MarketId::new(seed.id) == market)
                .map(|seed| seed.to_market_config()))
        })
    }

    fn save_status<'a>(
        &'a self,
        market: MarketId,
        status: MarketStatus,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.statuses.lock().insert(market, status);
            debug!(market = %market, status = %status, "market status saved");
            Ok(())
        })
    }

    fn append_history<'a>(&'a self, record: StatusChangeRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut history = self.history.lock();
            history.push_back(record);
            if history.len() > STATUS_HISTORY_CAP {
                history.pop_front();
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmsim_core::{OrderKind, TradePurpose};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn book_order(market: u64, side: OrderSide, price: Decimal) -> BookOrder {
        BookOrder {
            market: MarketId::new(market),
            side,
            price: Price::new(price),
            amount: Size::new(dec!(10)),
            at_ms: 1_000,
        }
    }

    fn trade(market: u64, price: Decimal, at_ms: u64) -> TradeRecord {
        TradeRecord {
            market: MarketId::new(market),
            side: OrderSide::Buy,
            price: Price::new(price),
            amount: Size::new(dec!(1)),
            notional: price,
            purpose: TradePurpose::PricePush,
            kind: OrderKind::AiOnly,
            bot: None,
            at_ms,
        }
    }

    #[tokio::test]
    async fn test_book_top_comes_from_resting_orders() {
        let book = SimOrderBook::new();
        book.place_order(book_order(1, OrderSide::Buy, dec!(99)))
            .await
            .unwrap();
        book.place_order(book_order(1, OrderSide::Buy, dec!(98)))
            .await
            .unwrap();
        book.place_order(book_order(1, OrderSide::Sell, dec!(101)))
            .await
            .unwrap();

        let top = book.book_top(MarketId::new(1)).await.unwrap().unwrap();
        assert_eq!(top.bid, Price::new(dec!(99)));
        assert_eq!(top.ask, Price::new(dec!(101)));
        assert_eq!(top.mid(), Some(Price::new(dec!(100))));

        assert!(book.book_top(MarketId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_market_orders_scopes_to_one_market() {
        let book = SimOrderBook::new();
        book.place_order(book_order(1, OrderSide::Buy, dec!(99)))
            .await
            .unwrap();
        book.place_order(book_order(1, OrderSide::Sell, dec!(101)))
            .await
            .unwrap();
        book.place_order(book_order(2, OrderSide::Buy, dec!(50)))
            .await
            .unwrap();

        let cancelled = book.cancel_market_orders(MarketId::new(1)).await.unwrap();
        assert_eq!(cancelled, 2);
        assert_eq!(book.resting(MarketId::new(1)), 0);
        assert_eq!(book.resting(MarketId::new(2)), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_errors() {
        let book = SimOrderBook::new();
        let err = book
            .cancel_order(MarketId::new(1), OrderId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Book(_)));
    }

    #[tokio::test]
    async fn test_ring_history_caps_and_returns_newest_first() {
        let history = RingHistory::new();
        let market = MarketId::new(1);
        for i in 0..(TRADE_CAP + 5) {
            history
                .record_trade(trade(1, dec!(100), i as u64))
                .await
                .unwrap();
        }
        assert_eq!(history.trade_count(market), TRADE_CAP);

        let recent = history.recent_trades(market, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].at_ms, (TRADE_CAP + 4) as u64);
        assert!(recent[0].at_ms > recent[2].at_ms);
    }

    #[tokio::test]
    async fn test_last_close_prefers_freshest_record() {
        let history = RingHistory::new();
        let market = MarketId::new(1);
        assert!(history.last_close_price(market).await.unwrap().is_none());

        history.record_trade(trade(1, dec!(100), 1_000)).await.unwrap();
        history
            .record_price_sample(PriceSample {
                market,
                price: Price::new(dec!(101)),
                at_ms: 2_000,
            })
            .await
            .unwrap();
        assert_eq!(
            history.last_close_price(market).await.unwrap(),
            Some(Price::new(dec!(101)))
        );

        history.record_trade(trade(1, dec!(102), 3_000)).await.unwrap();
        assert_eq!(
            history.last_close_price(market).await.unwrap(),
            Some(Price::new(dec!(102)))
        );
    }

    #[tokio::test]
    async fn test_log_sink_always_accepts() {
        let sink = LogEventSink::new();
        let event = SimEvent::StatusChange {
            market: "AIX/USDT".to_string(),
            from: "RUNNING".to_string(),
            to: "PAUSED".to_string(),
            reason: "test".to_string(),
            at_ms: 1_000,
        };
        assert!(sink.publish(event).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_store_reloads_edited_config() {
        let path = std::env::temp_dir().join(format!(
            "mmsim-backends-reload-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
            [[markets]]
            id = 1
            symbol = "AIX/USDT"
            target_price = "100"
            price_range_low = "95"
            price_range_high = "105"
            "#,
        )
        .unwrap();

        let store = FileConfigStore::new(path.clone());
        let market = MarketId::new(1);
        let config = store.load_market_config(market).await.unwrap().unwrap();
        assert_eq!(config.target_price, Price::new(dec!(100)));
        assert!(store
            .load_market_config(MarketId::new(9))
            .await
            .unwrap()
            .is_none());

        std::fs::write(
            &path,
            r#"
            [[markets]]
            id = 1
            symbol = "AIX/USDT"
            target_price = "102"
            price_range_low = "95"
            price_range_high = "105"
            "#,
        )
        .unwrap();
        let reloaded = store.load_market_config(market).await.unwrap().unwrap();
        assert_eq!(reloaded.target_price, Price::new(dec!(102)));

        std::fs::remove_file(&path).unwrap();
        let err = store.load_market_config(market).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
    }

    #[tokio::test]
    async fn test_file_store_records_status_writes() {
        let store = FileConfigStore::new(PathBuf::from("unused.toml"));
        let market = MarketId::new(1);
        store
            .save_status(market, MarketStatus::Active)
            .await
            .unwrap();
        store
            .save_status(market, MarketStatus::Paused)
            .await
            .unwrap();
        store
            .append_history(StatusChangeRecord {
                market,
                from: "RUNNING".to_string(),
                to: "PAUSED".to_string(),
                reason: "operator hold".to_string(),
                at_ms: 5_000,
            })
            .await
            .unwrap();

        assert_eq!(store.status(market), Some(MarketStatus::Paused));
        let history = store.status_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "operator hold");
    }
}
