use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::constants::{
    BINANCE_FUTURES_BASE, BINANCE_SPOT_BASE, BYBIT_BASE, DEFAULT_ACCOUNT_BALANCE,
    DEFAULT_PROVIDER_TIMEOUT_SECONDS, DEFAULT_RATE_LIMIT_COOLDOWN_MS, DEFAULT_RISK_PERCENT,
};
use crate::types::timeframe::Timeframe;

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub app: AppConfig,
    pub providers: ProvidersConfig,
    pub analysis: AnalysisConfig,
    pub risk: RiskConfig,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
    #[serde(default = "default_log_filter")]
    pub default_filter: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

/// File log rotation. One analysis pass writes a single file by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

fn default_log_file() -> String {
    "engine.log".into()
}

fn default_log_filter() -> String {
    "smc_engine=info,warn".into()
}

// ---------------------------------------------------------------------------
// providers.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Tried in ascending `priority` order.
    pub sources: Vec<ProviderConfig>,
    #[serde(default = "default_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_RATE_LIMIT_COOLDOWN_MS
}

/// Provider-specific response shape and endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `/fapi/v1/klines`, flat array of arrays.
    BinanceFutures,
    /// `/api/v3/klines`, flat array of arrays.
    BinanceSpot,
    /// `/v5/market/kline`, nested `{result:{list}}`, newest first.
    Bybit,
}

impl ProviderKind {
    #[must_use]
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::BinanceFutures => BINANCE_FUTURES_BASE,
            Self::BinanceSpot => BINANCE_SPOT_BASE,
            Self::Bybit => BYBIT_BASE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub priority: u32,
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Flat-array providers that return the series newest first.
    #[serde(default)]
    pub newest_first: bool,
}

impl ProviderConfig {
    /// Default entry for `kind` at `priority`.
    #[must_use]
    pub fn for_kind(name: &str, kind: ProviderKind, priority: u32) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            priority,
            base_url: kind.default_base_url().to_string(),
            timeout_seconds: DEFAULT_PROVIDER_TIMEOUT_SECONDS,
            newest_first: false,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sources: vec![
                ProviderConfig::for_kind("binance_futures", ProviderKind::BinanceFutures, 1),
                ProviderConfig::for_kind("binance_spot", ProviderKind::BinanceSpot, 2),
                ProviderConfig::for_kind("bybit", ProviderKind::Bybit, 3),
            ],
            rate_limit_cooldown_ms: DEFAULT_RATE_LIMIT_COOLDOWN_MS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECONDS
}

// ---------------------------------------------------------------------------
// analysis.json
// ---------------------------------------------------------------------------

/// Immutable operating parameters passed into every analysis stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fusion weight table, in primary-selection order.
    pub timeframes: Vec<TimeframeWeight>,
    pub structure: StructureParams,
    pub patterns: PatternParams,
    pub thresholds: SignalThresholds,
    pub levels: LevelParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeframes: [Timeframe::D1, Timeframe::H4, Timeframe::H1, Timeframe::M15]
                .into_iter()
                .map(TimeframeWeight::from_timeframe)
                .collect(),
            structure: StructureParams::default(),
            patterns: PatternParams::default(),
            thresholds: SignalThresholds::default(),
            levels: LevelParams::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeframeWeight {
    pub timeframe: Timeframe,
    #[serde(with = "rust_decimal::serde::str")]
    pub weight: Decimal,
    pub candles: u32,
}

impl TimeframeWeight {
    #[must_use]
    pub fn from_timeframe(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            weight: timeframe.default_weight(),
            candles: timeframe.default_candle_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StructureParams {
    /// Candles each side a swing must dominate.
    pub swing_lookback: usize,
    /// Below this many candles the structure is empty and neutral.
    pub min_candles: usize,
    pub atr_period: usize,
}

impl Default for StructureParams {
    fn default() -> Self {
        Self {
            swing_lookback: 3,
            min_candles: 10,
            atr_period: 14,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatternParams {
    #[serde(with = "rust_decimal::serde::str")]
    pub order_block_body_ratio: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub order_block_strength: Decimal,
    pub max_order_blocks: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub fvg_strength: Decimal,
    pub max_fair_value_gaps: usize,
    pub liquidity_lookback: usize,
    pub liquidity_edge_margin: usize,
    pub max_liquidity_levels: usize,
    pub volume_bands: u32,
    pub volume_recent_window: usize,
    pub volume_baseline_window: usize,
    /// Fraction of current price that defines "nearby" for every pattern.
    #[serde(with = "rust_decimal::serde::str")]
    pub proximity_pct: Decimal,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            order_block_body_ratio: dec!(1.5),
            order_block_strength: dec!(0.7),
            max_order_blocks: 10,
            fvg_strength: dec!(0.6),
            max_fair_value_gaps: 8,
            liquidity_lookback: 2,
            liquidity_edge_margin: 5,
            max_liquidity_levels: 6,
            volume_bands: 10,
            volume_recent_window: 5,
            volume_baseline_window: 15,
            proximity_pct: dec!(0.05),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    /// Overall confidence floor below which the result is NO_TRADE.
    pub min_confidence: u8,
    /// Bias magnitude that must be exceeded for LONG/SHORT.
    #[serde(with = "rust_decimal::serde::str")]
    pub bias_threshold: Decimal,
    /// Own-confidence a timeframe needs to be chosen as primary.
    pub primary_confidence: u8,
    pub confluence_bonus_per_tf: u8,
    pub max_confluence_bonus: u8,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 60,
            bias_threshold: dec!(0.5),
            primary_confidence: 70,
            confluence_bonus_per_tf: 8,
            max_confluence_bonus: 30,
        }
    }
}

/// ATR multiples and entry offsets used by the level calculator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LevelParams {
    #[serde(with = "rust_decimal::serde::str")]
    pub min_risk_reward: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_risk_reward: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub order_block_entry_offset: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fvg_entry_offset: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub liquidity_entry_offset: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub market_entry_offset: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_search_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_buffer_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub default_stop_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_search_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub default_target_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_distance_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fallback_stop_atr: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub fallback_target_atr: Decimal,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            min_risk_reward: dec!(1.5),
            max_risk_reward: dec!(2.5),
            order_block_entry_offset: dec!(0.002),
            fvg_entry_offset: dec!(0.005),
            liquidity_entry_offset: dec!(0.001),
            market_entry_offset: dec!(0.002),
            stop_search_atr: dec!(1.5),
            stop_buffer_atr: dec!(0.6),
            default_stop_atr: dec!(0.8),
            target_search_atr: dec!(1.2),
            default_target_atr: dec!(0.8),
            max_distance_atr: dec!(2.5),
            fallback_stop_atr: dec!(1.0),
            fallback_target_atr: dec!(1.5),
        }
    }
}

// ---------------------------------------------------------------------------
// risk.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub risk_percent: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub account_balance: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_percent: DEFAULT_RISK_PERCENT,
            account_balance: DEFAULT_ACCOUNT_BALANCE,
        }
    }
}
