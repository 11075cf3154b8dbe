//! Events published by the engine while a simulation runs.
//!
//! Consumers (activity feeds, dashboards, log sinks) receive these through
//! the [`EventSink`](crate::ports::EventSink) port. Payloads are flat and
//! stringly-keyed on purpose: they cross a process boundary in most
//! deployments.

use mmsim_core::{OrderSide, Price, Size, TradePurpose};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimEvent {
    /// A trade happened, AI-only or split with the real book.
    Trade {
        market: String,
        side: OrderSide,
        price: Price,
        amount: Size,
        notional: Decimal,
        purpose: TradePurpose,
        real_amount: Size,
        ai_amount: Size,
        bot: Option<String>,
        at_ms: u64,
    },
    /// The real-liquidity portion of a trade was placed on the book.
    OrderPlaced {
        market: String,
        order_id: String,
        side: OrderSide,
        price: Price,
        amount: Size,
        at_ms: u64,
    },
    /// A market moved between lifecycle states.
    StatusChange {
        market: String,
        from: String,
        to: String,
        reason: String,
        at_ms: u64,
    },
    /// A bot did something worth showing in an activity feed.
    BotActivity {
        market: String,
        bot: String,
        personality: String,
        action: String,
        detail: String,
        at_ms: u64,
    },
}

impl SimEvent {
    /// Stable discriminant, matching the serialized `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Trade { .. } => "TRADE",
            Self::OrderPlaced { .. } => "ORDER_PLACED",
            Self::StatusChange { .. } => "STATUS_CHANGE",
            Self::BotActivity { .. } => "BOT_ACTIVITY",
        }
    }
}
