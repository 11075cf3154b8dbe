//! External price feed and volatility tracking for mmsim.
//!
//! Each market owns one [`PriceTracker`]: it blends an external reference
//! price (when the feed knows the symbol) with the internally simulated
//! price, keeps a bounded sample history, and derives short-window
//! volatility from it.

pub mod error;
pub mod feed;
pub mod tracker;

pub use error::{PriceError, Result};
pub use feed::{BoxFuture, DynPriceFeed, HttpPriceFeed, MockPriceFeed, PriceFeed, Ticker};
pub use tracker::{PricePoint, PriceTracker};
