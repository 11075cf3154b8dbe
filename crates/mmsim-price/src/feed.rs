//! Price feed trait and implementations.
//!
//! The tracker talks to the outside world only through [`PriceFeed`],
//! so tests can inject a scripted feed and the engine can run fully
//! offline when no feed is configured.

use std::pin::Pin;
use std::sync::Arc;

use mmsim_core::Price;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{PriceError, Result};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Ticker snapshot from an external venue.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker {
    pub last: Price,
    pub high: Price,
    pub low: Price,
    pub base_volume: Decimal,
}

/// Trait for fetching external reference prices.
pub trait PriceFeed: Send + Sync {
    /// Fetch the latest ticker for a symbol.
    ///
    /// Must return [`PriceError::SymbolUnsupported`] when the venue does
    /// not list the symbol, so callers can stop asking.
    fn fetch_ticker<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Ticker>>;
}

/// Arc wrapper for PriceFeed trait objects.
pub type DynPriceFeed = Arc<dyn PriceFeed>;

/// REST-backed price feed.
///
/// Expects `GET {base_url}/api/v1/ticker/{symbol}` returning a JSON
/// ticker; a 404 is interpreted as "symbol unsupported".
pub struct HttpPriceFeed {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPriceFeed {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn ticker_url(&self, symbol: &str) -> String {
        format!(
            "{}/api/v1/ticker/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }
}

impl PriceFeed for HttpPriceFeed {
    fn fetch_ticker<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Ticker>> {
        Box::pin(async move {
            let url = self.ticker_url(symbol);
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| PriceError::FeedUnavailable(e.to_string()))?;

            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(PriceError::SymbolUnsupported(symbol.to_string()));
            }
            if !resp.status().is_success() {
                return Err(PriceError::FeedUnavailable(format!(
                    "status {} from {url}",
                    resp.status()
                )));
            }

            resp.json::<Ticker>()
                .await
                .map_err(|e| PriceError::MalformedPayload(e.to_string()))
        })
    }
}

/// Mock price feed for testing.
#[derive(Default)]
pub struct MockPriceFeed {
    /// Recorded fetch calls for verification.
    calls: parking_lot::Mutex<Vec<String>>,
    /// Scripted responses, consumed front to back; the last one repeats.
    responses: parking_lot::Mutex<Vec<Result<Ticker>>>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response. Once the queue is down to one entry it is
    /// returned for every subsequent call.
    pub fn push_response(&self, response: Result<Ticker>) {
        self.responses.lock().push(response);
    }

    /// Convenience: queue a successful ticker at `last`.
    pub fn push_price(&self, last: Price) {
        self.push_response(Ok(Ticker {
            last,
            high: last,
            low: last,
            base_volume: Decimal::ZERO,
        }));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl PriceFeed for MockPriceFeed {
    fn fetch_ticker<'a>(&'a self, symbol: &'a str) -> BoxFuture<'a, Result<Ticker>> {
        Box::pin(async move {
            self.calls.lock().push(symbol.to_string());
            let mut responses = self.responses.lock();
            match responses.len() {
                0 => Err(PriceError::FeedUnavailable("no scripted response".into())),
                1 => responses[0].clone(),
                _ => responses.remove(0),
            }
        })
    }
}
