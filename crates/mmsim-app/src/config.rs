//! Application configuration.

use crate::error::{AppError, AppResult};
use mmsim_core::{
    AggressionLevel, BotConfig, BotId, MarketConfig, MarketId, MarketStatus, Personality,
    PoolBalances, Price,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Per-market tick cadence (ms). Default: 1000.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Seed for oscillators, tick rolls and bot strategies. Default: 0.
    #[serde(default)]
    pub seed: u64,
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            seed: 0,
        }
    }
}

/// External reference feed settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Whether to poll an external venue for reference prices.
    /// Default: false (markets price purely off their own history).
    #[serde(default)]
    pub enabled: bool,
    /// REST base URL of the reference venue. Required when enabled.
    #[serde(default)]
    pub base_url: String,
}

/// Risk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    /// Consecutive losing trades before a market's trading halts.
    /// Default: 5.
    #[serde(default = "default_max_consecutive_losses")]
    pub max_consecutive_losses: u32,
}

fn default_max_consecutive_losses() -> u32 {
    5
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_consecutive_losses: default_max_consecutive_losses(),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Period between stats summaries in the log (secs). Default: 60.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

/// Bot roster entry: a personality and how many of it to spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSeed {
    pub personality: Personality,
    /// Number of bots with this personality. Default: 1.
    #[serde(default = "default_bot_count")]
    pub count: u32,
}

fn default_bot_count() -> u32 {
    1
}

/// One market as declared in TOML.
///
/// Thin mirror of [`MarketConfig`]: ids are plain integers, bots are
/// personality counts instead of full per-bot configs, and runtime-only
/// fields (status, daily counters) are filled on conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSeed {
    pub id: u64,
    /// Trading pair, e.g. "AIX/USDT".
    pub symbol: String,
    pub target_price: Price,
    pub price_range_low: Price,
    pub price_range_high: Price,
    #[serde(default = "default_aggression")]
    pub aggression: AggressionLevel,
    /// Daily volume cap in base units. Zero (default) means uncapped.
    #[serde(default)]
    pub max_daily_volume: Decimal,
    /// Volatility (percent) above which trading pauses when
    /// `pause_on_high_volatility` is set. Default: 5.
    #[serde(default = "default_volatility_threshold")]
    pub volatility_threshold: Decimal,
    #[serde(default)]
    pub pause_on_high_volatility: bool,
    /// Share of each trade placed on the real book, in percent [0, 100].
    /// Default: 0 (fully simulated).
    #[serde(default)]
    pub real_liquidity_percent: Decimal,
    /// Pool backing the real-liquidity share. Required when
    /// `real_liquidity_percent` > 0.
    #[serde(default)]
    pub pool: Option<PoolBalances>,
    /// Bot population. Empty (default) gets the standard mix.
    #[serde(default)]
    pub bots: Vec<BotSeed>,
}

fn default_aggression() -> AggressionLevel {
    AggressionLevel::Moderate
}

fn default_volatility_threshold() -> Decimal {
    Decimal::from(5)
}

impl MarketSeed {
    /// Expand into the engine's market config. Bot ids are freshly
    /// generated, so two calls yield distinct rosters.
    pub fn to_market_config(&self) -> MarketConfig {
        let bots = self
            .bots
            .iter()
            .flat_map(|seed| {
                (0..seed.count).map(|_| BotConfig::sample(BotId::generate(), seed.personality))
            })
            .collect();
        MarketConfig {
            id: MarketId::new(self.id),
            symbol: self.symbol.clone(),
            status: MarketStatus::Active,
            target_price: self.target_price,
            price_range_low: self.price_range_low,
            price_range_high: self.price_range_high,
            aggression: self.aggression,
            max_daily_volume: self.max_daily_volume,
            current_daily_volume: Decimal::ZERO,
            volatility_threshold: self.volatility_threshold,
            pause_on_high_volatility: self.pause_on_high_volatility,
            real_liquidity_percent: self.real_liquidity_percent,
            pool: self.pool,
            bots,
        }
    }

    /// Out-of-the-box market used when no config file is present.
    fn demo() -> Self {
        Self {
            id: 1,
            symbol: "AIX/USDT".to_string(),
            target_price: Price::new(Decimal::from(100)),
            price_range_low: Price::new(Decimal::from(95)),
            price_range_high: Price::new(Decimal::from(105)),
            aggression: default_aggression(),
            max_daily_volume: Decimal::ZERO,
            volatility_threshold: default_volatility_threshold(),
            pause_on_high_volatility: false,
            real_liquidity_percent: Decimal::ZERO,
            pool: None,
            bots: Vec::new(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Markets to run.
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketSeed>,
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,
    /// External reference feed settings.
    #[serde(default)]
    pub feed: FeedSettings,
    /// Risk settings.
    #[serde(default)]
    pub risk: RiskSettings,
    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    /// File this config was loaded from, when it came from one. Config
    /// reloads at daily reset re-read it.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

fn default_markets() -> Vec<MarketSeed> {
    vec![MarketSeed::demo()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            markets: default_markets(),
            engine: EngineSettings::default(),
            feed: FeedSettings::default(),
            risk: RiskSettings::default(),
            telemetry: TelemetrySettings::default(),
            source_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file.
    pub fn load() -> AppResult<Self> {
        // Try to load from config file
        let config_path =
            std::env::var("MMSIM_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.source_path = Some(PathBuf::from(path));
        Ok(config)
    }

    /// Reject configs the engine would refuse at registration time.
    pub fn validate(&self) -> AppResult<()> {
        if self.markets.is_empty() {
            return Err(AppError::Config("no markets configured".to_string()));
        }
        if self.feed.enabled && self.feed.base_url.is_empty() {
            return Err(AppError::Config(
                "feed.base_url required when feed.enabled".to_string(),
            ));
        }
        for seed in &self.markets {
            seed.to_market_config()
                .validate()
                .map_err(|e| AppError::Config(e.to_string()))?;
        }
        Ok(())
    }
}
