//! Trade execution: liquidity split, book placement, history, events.

use mmsim_core::{
    BookTop, BotId, MarketConfig, MarketId, OrderId, OrderKind, OrderSide, Price, Size,
    TradePurpose,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use crate::liquidity::LiquiditySplit;
use crate::ports::{
    BookOrder, DynEventSink, DynHistoryStore, DynOrderBook, PriceSample, TradeRecord,
};
use crate::SimEvent;

/// Who initiated a trade.
#[derive(Debug, Clone)]
pub enum TradeOrigin {
    /// The engine's own price oscillation.
    Engine,
    /// A simulated agent.
    Bot { id: BotId, name: String },
}

impl TradeOrigin {
    fn bot_id(&self) -> Option<BotId> {
        match self {
            Self::Engine => None,
            Self::Bot { id, .. } => Some(*id),
        }
    }

    fn label(&self) -> Option<String> {
        match self {
            Self::Engine => None,
            Self::Bot { name, .. } => Some(name.clone()),
        }
    }
}

/// What actually happened for one requested trade.
#[derive(Debug, Clone)]
pub struct ExecutedTrade {
    pub order_id: Option<OrderId>,
    pub real_amount: Size,
    pub ai_amount: Size,
    pub notional: Decimal,
    /// True when a real portion was requested but did not survive: either
    /// the placement failed or the order had to be pulled back because its
    /// tape record could not be written.
    pub downgraded: bool,
    /// History and mirror writes that failed during this execution.
    pub store_failures: u32,
}

impl ExecutedTrade {
    /// Whether any step of this execution degraded.
    #[must_use]
    pub fn had_errors(&self) -> bool {
        self.downgraded || self.store_failures > 0
    }
}

/// Pushes trades out through the ports.
///
/// The real-liquidity portion goes to the order book; a placement failure
/// downgrades that portion to AI-only instead of dropping the trade. An
/// order whose tape record cannot be written is cancelled again, the tape
/// stays the source of truth. History and event failures are logged and
/// swallowed, they never block the tick loop.
pub struct TradeExecutor {
    book: DynOrderBook,
    history: DynHistoryStore,
    events: DynEventSink,
}

impl TradeExecutor {
    #[must_use]
    pub fn new(book: DynOrderBook, history: DynHistoryStore, events: DynEventSink) -> Self {
        Self {
            book,
            history,
            events,
        }
    }

    pub async fn execute(
        &self,
        config: &MarketConfig,
        side: OrderSide,
        price: Price,
        amount: Size,
        purpose: TradePurpose,
        origin: &TradeOrigin,
        now_ms: u64,
    ) -> ExecutedTrade {
        let mut split = LiquiditySplit::of(amount, config.real_liquidity_percent);
        let notional = price.inner() * amount.inner();

        let mut order_id = None;
        let mut downgraded = false;
        let mut store_failures = 0u32;
        if split.has_real() {
            let order = BookOrder {
                market: config.id,
                side,
                price,
                amount: split.real,
                at_ms: now_ms,
            };
            match self.book.place_order(order).await {
                Ok(id) => {
                    order_id = Some(id);
                    self.announce(SimEvent::OrderPlaced {
                        market: config.symbol.clone(),
                        order_id: id.to_string(),
                        side,
                        price,
                        amount: split.real,
                        at_ms: now_ms,
                    })
                    .await;
                }
                Err(err) => {
                    warn!(
                        market = %config.symbol,
                        error = %err,
                        "order placement failed, running trade as AI-only"
                    );
                    split = LiquiditySplit::of(amount, Decimal::ZERO);
                    downgraded = true;
                }
            }
        }

        if split.real.is_positive() {
            let recorded = self
                .record(TradeRecord {
                    market: config.id,
                    side,
                    price,
                    amount: split.real,
                    notional: price.inner() * split.real.inner(),
                    purpose,
                    kind: OrderKind::Real,
                    bot: origin.bot_id(),
                    at_ms: now_ms,
                })
                .await;
            if !recorded {
                store_failures += 1;
                // An order without a tape record is invisible to
                // reconciliation; pull it back and run AI-only.
                if let Some(id) = order_id.take() {
                    if let Err(err) = self.book.cancel_order(config.id, id).await {
                        warn!(
                            market = %config.symbol,
                            error = %err,
                            "compensating cancel failed"
                        );
                    }
                }
                split = LiquiditySplit::of(amount, Decimal::ZERO);
                downgraded = true;
            }
        }
        if split.ai.is_positive() {
            let recorded = self
                .record(TradeRecord {
                    market: config.id,
                    side,
                    price,
                    amount: split.ai,
                    notional: price.inner() * split.ai.inner(),
                    purpose,
                    kind: OrderKind::AiOnly,
                    bot: origin.bot_id(),
                    at_ms: now_ms,
                })
                .await;
            if !recorded {
                store_failures += 1;
            }
            // The AI share never rests on the book; mirror it so the venue
            // still displays the liquidity.
            if let Err(err) = self
                .book
                .sync_visible_liquidity(config.id, price, split.ai)
                .await
            {
                warn!(market = %config.symbol, error = %err, "liquidity mirror sync failed");
                store_failures += 1;
            }
        }

        let side_label = if side.is_buy() { "buy" } else { "sell" };
        let purpose_label = purpose.to_string();
        for (portion, kind) in [(split.real, OrderKind::Real), (split.ai, OrderKind::AiOnly)] {
            if portion.is_positive() {
                mmsim_telemetry::Metrics::trade(
                    &config.symbol,
                    side_label,
                    &purpose_label,
                    &kind.to_string(),
                );
                mmsim_telemetry::Metrics::trade_volume(
                    &config.symbol,
                    portion.inner().to_f64().unwrap_or(0.0),
                );
            }
        }

        self.announce(SimEvent::Trade {
            market: config.symbol.clone(),
            side,
            price,
            amount,
            notional,
            purpose,
            real_amount: split.real,
            ai_amount: split.ai,
            bot: origin.label(),
            at_ms: now_ms,
        })
        .await;

        ExecutedTrade {
            order_id,
            real_amount: split.real,
            ai_amount: split.ai,
            notional,
            downgraded,
            store_failures,
        }
    }

    /// Direct book placement, for seeding and maintenance orders.
    pub async fn place_order(&self, order: BookOrder) -> crate::Result<OrderId> {
        self.book.place_order(order).await
    }

    /// Pull every resting order for a market off the book.
    pub async fn cancel_all(&self, config: &MarketConfig) -> u32 {
        match self.book.cancel_market_orders(config.id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(market = %config.symbol, error = %err, "order cancel sweep failed");
                0
            }
        }
    }

    /// Best-effort top-of-book lookup; lookup errors degrade to `None`.
    pub async fn book_top(&self, config: &MarketConfig) -> Option<BookTop> {
        match self.book.book_top(config.id).await {
            Ok(top) => top,
            Err(err) => {
                warn!(market = %config.symbol, error = %err, "book top lookup failed");
                None
            }
        }
    }

    /// Append a price sample. Returns false on a failed write.
    pub async fn record_price_sample(&self, sample: PriceSample) -> bool {
        if let Err(err) = self.history.record_price_sample(sample).await {
            warn!(error = %err, "price sample write failed");
            return false;
        }
        true
    }

    /// Most recent trades for a market, newest first; empty on error.
    pub async fn recent_trades(&self, market: MarketId, limit: usize) -> Vec<TradeRecord> {
        match self.history.recent_trades(market, limit).await {
            Ok(trades) => trades,
            Err(err) => {
                warn!(%market, error = %err, "recent trade lookup failed");
                Vec::new()
            }
        }
    }

    /// Last recorded closing price; lookup errors degrade to `None`.
    pub async fn last_close_price(&self, market: MarketId) -> Option<Price> {
        match self.history.last_close_price(market).await {
            Ok(price) => price,
            Err(err) => {
                warn!(%market, error = %err, "close price lookup failed");
                None
            }
        }
    }

    /// Mirror the displayed liquidity at a price level, best-effort.
    pub async fn sync_visible_liquidity(&self, config: &MarketConfig, price: Price, amount: Size) {
        if let Err(err) = self
            .book
            .sync_visible_liquidity(config.id, price, amount)
            .await
        {
            warn!(market = %config.symbol, error = %err, "liquidity mirror sync failed");
        }
    }

    /// Publish an event; sink failures are logged and swallowed.
    pub async fn announce(&self, event: SimEvent) {
        let kind = event.kind();
        if let Err(err) = self.events.publish(event).await {
            warn!(kind, error = %err, "event publish failed");
        }
    }

    async fn record(&self, record: TradeRecord) -> bool {
        if let Err(err) = self.history.record_trade(record).await {
            warn!(error = %err, "trade history write failed");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockEventSink, MockHistoryStore, MockOrderBook};
    use mmsim_core::{AggressionLevel, MarketId, MarketStatus};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn config(real_percent: Decimal) -> MarketConfig {
        MarketConfig {
            id: MarketId::new(4),
            symbol: "AIX/USDT".to_string(),
            status: MarketStatus::Active,
            target_price: Price::new(dec!(100)),
            price_range_low: Price::new(dec!(95)),
            price_range_high: Price::new(dec!(105)),
            aggression: AggressionLevel::Moderate,
            max_daily_volume: Decimal::ZERO,
            current_daily_volume: Decimal::ZERO,
            volatility_threshold: dec!(5),
            pause_on_high_volatility: false,
            real_liquidity_percent: real_percent,
            pool: None,
            bots: Vec::new(),
        }
    }

    fn executor() -> (
        TradeExecutor,
        Arc<MockOrderBook>,
        Arc<MockHistoryStore>,
        Arc<MockEventSink>,
    ) {
        let book = Arc::new(MockOrderBook::new());
        let history = Arc::new(MockHistoryStore::new());
        let events = Arc::new(MockEventSink::new());
        let exec = TradeExecutor::new(book.clone(), history.clone(), events.clone());
        (exec, book, history, events)
    }

    #[tokio::test]
    async fn ai_only_trade_skips_the_book_but_mirrors_liquidity() {
        let (exec, book, history, events) = executor();
        let cfg = config(Decimal::ZERO);

        let done = exec
            .execute(
                &cfg,
                OrderSide::Buy,
                Price::new(dec!(100)),
                Size::new(dec!(5)),
                TradePurpose::PricePush,
                &TradeOrigin::Engine,
                1_000,
            )
            .await;

        assert!(done.order_id.is_none());
        assert!(!done.had_errors());
        assert_eq!(done.ai_amount, Size::new(dec!(5)));
        assert_eq!(book.placed_count(), 0);
        assert_eq!(
            book.synced(),
            vec![(MarketId::new(4), Price::new(dec!(100)), Size::new(dec!(5)))]
        );
        assert_eq!(history.record_count(), 1);
        assert_eq!(history.records()[0].kind, OrderKind::AiOnly);
        assert_eq!(events.count_kind("TRADE"), 1);
        assert_eq!(events.count_kind("ORDER_PLACED"), 0);
    }

    #[tokio::test]
    async fn split_trade_places_the_real_portion() {
        let (exec, book, history, events) = executor();
        let cfg = config(dec!(20));

        let done = exec
            .execute(
                &cfg,
                OrderSide::Sell,
                Price::new(dec!(101)),
                Size::new(dec!(10)),
                TradePurpose::Liquidity,
                &TradeOrigin::Engine,
                2_000,
            )
            .await;

        assert!(done.order_id.is_some());
        assert_eq!(done.real_amount, Size::new(dec!(2)));
        assert_eq!(done.ai_amount, Size::new(dec!(8)));
        assert_eq!(book.placed_count(), 1);
        assert_eq!(book.placed()[0].amount, Size::new(dec!(2)));
        // Only the synthetic share is mirrored.
        assert_eq!(book.synced()[0].2, Size::new(dec!(8)));
        assert_eq!(history.record_count(), 2);
        assert_eq!(events.count_kind("ORDER_PLACED"), 1);
    }

    #[tokio::test]
    async fn placement_failure_downgrades_to_ai_only() {
        let (exec, book, history, events) = executor();
        book.fail_placements(true);
        let cfg = config(dec!(50));

        let done = exec
            .execute(
                &cfg,
                OrderSide::Buy,
                Price::new(dec!(99)),
                Size::new(dec!(4)),
                TradePurpose::SpreadMaintenance,
                &TradeOrigin::Engine,
                3_000,
            )
            .await;

        assert!(done.order_id.is_none());
        assert!(done.downgraded);
        assert!(done.had_errors());
        assert_eq!(done.real_amount, Size::new(Decimal::ZERO));
        assert_eq!(done.ai_amount, Size::new(dec!(4)));
        assert_eq!(history.record_count(), 1);
        assert_eq!(history.records()[0].kind, OrderKind::AiOnly);
        assert_eq!(events.count_kind("ORDER_PLACED"), 0);
        assert_eq!(events.count_kind("TRADE"), 1);
    }

    #[tokio::test]
    async fn unrecordable_order_is_cancelled_again() {
        let (exec, book, history, _events) = executor();
        history.fail_writes(true);
        let cfg = config(dec!(50));

        let done = exec
            .execute(
                &cfg,
                OrderSide::Buy,
                Price::new(dec!(100)),
                Size::new(dec!(4)),
                TradePurpose::Liquidity,
                &TradeOrigin::Engine,
                4_000,
            )
            .await;

        // Placed, then pulled back when the tape write failed.
        assert_eq!(book.placed_count(), 0);
        assert!(done.order_id.is_none());
        assert!(done.downgraded);
        // Real record and AI record both failed.
        assert_eq!(done.store_failures, 2);
        assert_eq!(history.record_count(), 0);
    }

    #[tokio::test]
    async fn bot_origin_is_threaded_through() {
        let (exec, _book, history, events) = executor();
        let cfg = config(Decimal::ZERO);
        let bot = BotId::generate();

        exec.execute(
            &cfg,
            OrderSide::Buy,
            Price::new(dec!(100)),
            Size::new(dec!(1)),
            TradePurpose::Volatility,
            &TradeOrigin::Bot {
                id: bot,
                name: "scalper-1".to_string(),
            },
            4_000,
        )
        .await;

        assert_eq!(history.records()[0].bot, Some(bot));
        match &events.events()[0] {
            SimEvent::Trade { bot: Some(name), .. } => assert_eq!(name, "scalper-1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
