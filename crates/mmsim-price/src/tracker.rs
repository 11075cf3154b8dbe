//! Per-market price state and short-window volatility.
//!
//! The tracker holds the authoritative current price for one market: the
//! external reference price when the feed lists the symbol, otherwise the
//! last internally recorded (simulated) price. History is a bounded ring;
//! volatility is the standard deviation of sample-over-sample returns.

use std::collections::VecDeque;

use mmsim_core::Price;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::feed::{DynPriceFeed, Ticker};

const DEFAULT_MAX_SAMPLES: usize = 100;
const DEFAULT_CACHE_TTL_MS: u64 = 5_000;

/// One price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    pub price: Price,
    pub at_ms: u64,
}

#[derive(Debug, Clone)]
struct CachedTicker {
    ticker: Ticker,
    fetched_at_ms: u64,
}

/// Tracks current price, bounded history and volatility for one market.
pub struct PriceTracker {
    symbol: String,
    current: Price,
    history: VecDeque<PricePoint>,
    max_samples: usize,
    feed: Option<DynPriceFeed>,
    cache: Option<CachedTicker>,
    cache_ttl_ms: u64,
    /// Set once the feed reports the symbol as unsupported; from then on
    /// the tracker never calls the feed again for this market.
    feed_unsupported: bool,
}

impl PriceTracker {
    pub fn new(symbol: impl Into<String>, initial_price: Price, feed: Option<DynPriceFeed>) -> Self {
        Self {
            symbol: symbol.into(),
            current: initial_price,
            history: VecDeque::new(),
            max_samples: DEFAULT_MAX_SAMPLES,
            feed,
            cache: None,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            feed_unsupported: false,
        }
    }

    /// Override ring size and cache TTL (tests, non-standard markets).
    #[must_use]
    pub fn with_limits(mut self, max_samples: usize, cache_ttl_ms: u64) -> Self {
        self.max_samples = max_samples.max(2);
        self.cache_ttl_ms = cache_ttl_ms;
        self
    }

    /// Load an initial history window (e.g. the last hour of samples
    /// from the history store). Oldest first; trimmed to the ring size.
    pub fn seed_history(&mut self, points: impl IntoIterator<Item = PricePoint>) {
        for point in points {
            self.push_point(point);
        }
        if let Some(last) = self.history.back() {
            self.current = last.price;
        }
    }

    /// Refresh the current price from the external feed.
    ///
    /// Uses a short-TTL ticker cache, memoizes "symbol unsupported", and
    /// degrades to the last known price on any transient feed error.
    /// Always returns a usable price.
    pub async fn refresh(&mut self, now_ms: u64) -> Price {
        let Some(feed) = self.feed.clone() else {
            return self.current;
        };
        if self.feed_unsupported {
            return self.current;
        }
        if let Some(ref cached) = self.cache {
            if now_ms.saturating_sub(cached.fetched_at_ms) < self.cache_ttl_ms {
                return self.current;
            }
        }

        let fetched = feed.fetch_ticker(&self.symbol).await;
        match fetched {
            Ok(ticker) => {
                self.current = ticker.last;
                self.push_point(PricePoint {
                    price: ticker.last,
                    at_ms: now_ms,
                });
                self.cache = Some(CachedTicker {
                    ticker,
                    fetched_at_ms: now_ms,
                });
            }
            Err(e) if e.is_unsupported() => {
                warn!(
                    symbol = %self.symbol,
                    "external feed does not list symbol, switching to internal pricing only"
                );
                self.feed_unsupported = true;
            }
            Err(e) => {
                debug!(
                    symbol = %self.symbol,
                    error = %e,
                    "feed fetch failed, keeping last known price"
                );
            }
        }
        self.current
    }

    /// Record an internally simulated price as the new current price.
    pub fn record(&mut self, price: Price, now_ms: u64) {
        self.current = price;
        self.push_point(PricePoint { price, at_ms: now_ms });
    }

    fn push_point(&mut self, point: PricePoint) {
        self.history.push_back(point);
        while self.history.len() > self.max_samples {
            self.history.pop_front();
        }
    }

    #[must_use]
    pub fn current(&self) -> Price {
        self.current
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// True once the feed has been ruled out for this symbol.
    #[must_use]
    pub fn is_internal_only(&self) -> bool {
        self.feed_unsupported || self.feed.is_none()
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn history(&self) -> &VecDeque<PricePoint> {
        &self.history
    }

    /// Volatility over the ring: stddev of sample-over-sample returns,
    /// in percent. Not annualized; the window is short by construction.
    #[must_use]
    pub fn volatility_pct(&self) -> Decimal {
        let prices: Vec<f64> = self
            .history
            .iter()
            .filter_map(|p| p.price.inner().to_f64())
            .collect();
        if prices.len() < 2 {
            return Decimal::ZERO;
        }

        let mut returns = Vec::with_capacity(prices.len() - 1);
        for pair in prices.windows(2) {
            if pair[0] != 0.0 {
                returns.push((pair[1] - pair[0]) / pair[0]);
            }
        }
        if returns.is_empty() {
            return Decimal::ZERO;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let vol_pct = variance.sqrt() * 100.0;

        Decimal::from_f64_retain(vol_pct)
            .unwrap_or(Decimal::ZERO)
            .round_dp(8)
    }

    /// Percent change of the current price versus the oldest sample in
    /// the ring. Zero until at least one sample exists.
    #[must_use]
    pub fn change_pct(&self) -> Decimal {
        let oldest = match self.history.front() {
            Some(p) if p.price.is_positive() => p.price,
            _ => return Decimal::ZERO,
        };
        self.current.pct_from(oldest).unwrap_or(Decimal::ZERO)
    }
}
