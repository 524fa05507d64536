use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::patterns::{FairValueGap, LiquidityLevel, OrderBlock, VolumeProfile, ZoneKind};
use super::structure::{MarketStructure, Trend};
use super::timeframe::Timeframe;
use crate::constants::{REASON_LOW_CONFIDENCE, REASON_NO_BIAS, REASON_NO_DATA};
use crate::errors::EngineError;

/// Final signal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
    NoTrade,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
            Self::Neutral => "NEUTRAL",
            Self::NoTrade => "NO_TRADE",
        }
    }
}

/// Everything computed for one timeframe. Pattern lists are already filtered
/// to the proximity band around `price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    /// Latest close.
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub trend: Trend,
    /// Rich per-timeframe score in [0, 100], consumed by fusion.
    pub strength: u8,
    pub structure: MarketStructure,
    pub order_blocks: Vec<OrderBlock>,
    pub fair_value_gaps: Vec<FairValueGap>,
    pub liquidity_levels: Vec<LiquidityLevel>,
    pub volume_profile: VolumeProfile,
    #[serde(with = "rust_decimal::serde::str")]
    pub atr: Decimal,
    /// Quick heuristic confidence in [0, 100].
    pub confidence: u8,
}

impl TimeframeAnalysis {
    /// Whether at least one order block of `kind` is present.
    #[must_use]
    pub fn has_order_block(&self, kind: ZoneKind) -> bool {
        self.order_blocks.iter().any(|ob| ob.kind == kind)
    }
}

/// Entry, stop-loss and take-profit with the reported risk/reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    #[serde(with = "rust_decimal::serde::str")]
    pub entry: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub take_profit: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub risk_reward: Decimal,
}

/// Output of the position sizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub max_loss: Decimal,
}

/// The engine's only output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub symbol: String,
    pub direction: Direction,
    /// Overall confidence in [0, 100].
    pub confidence: u8,
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub entry: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub risk_reward: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub position_size: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub max_loss: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Weighted directional bias from fusion.
    #[serde(default, with = "rust_decimal::serde::str_option", skip_serializing_if = "Option::is_none")]
    pub bias: Option<Decimal>,
    pub timeframes_analyzed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_timeframe: Option<Timeframe>,
}

impl SignalResult {
    /// A result without levels.
    #[must_use]
    pub fn without_levels(
        symbol: &str,
        direction: Direction,
        confidence: u8,
        reason: &str,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            direction,
            confidence: confidence.min(100),
            entry: None,
            stop_loss: None,
            take_profit: None,
            risk_reward: None,
            position_size: None,
            max_loss: None,
            reason: Some(reason.to_string()),
            bias: None,
            timeframes_analyzed: 0,
            primary_timeframe: None,
        }
    }

    /// Resolve any engine error into a well-formed result.
    #[must_use]
    pub fn from_error(symbol: &str, err: &EngineError) -> Self {
        match err {
            EngineError::NoData => {
                Self::without_levels(symbol, Direction::NoTrade, 0, REASON_NO_DATA)
            }
            EngineError::LowConfidence { confidence } => {
                Self::without_levels(symbol, Direction::NoTrade, *confidence, REASON_LOW_CONFIDENCE)
            }
            EngineError::NoBias { confidence } => {
                Self::without_levels(symbol, Direction::Neutral, *confidence, REASON_NO_BIAS)
            }
            other => Self::without_levels(symbol, Direction::NoTrade, 0, &other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_no_data_result_shape() {
        let r = SignalResult::from_error("BTCUSDT", &EngineError::NoData);
        assert_eq!(r.direction, Direction::NoTrade);
        assert_eq!(r.confidence, 0);
        assert_eq!(r.reason.as_deref(), Some("No data"));
        assert!(r.entry.is_none());
    }

    #[test]
    fn test_low_confidence_keeps_number() {
        let r = SignalResult::from_error("ETHUSDT", &EngineError::LowConfidence { confidence: 42 });
        assert_eq!(r.direction, Direction::NoTrade);
        assert_eq!(r.confidence, 42);
    }

    #[test]
    fn test_no_bias_is_neutral() {
        let r = SignalResult::from_error("ETHUSDT", &EngineError::NoBias { confidence: 77 });
        assert_eq!(r.direction, Direction::Neutral);
        assert_eq!(r.confidence, 77);
        assert!(r.risk_reward.is_none());
    }

    #[test]
    fn test_analysis_error_carries_text() {
        let r = SignalResult::from_error("SOLUSDT", &EngineError::Analysis("zero risk".into()));
        assert_eq!(r.direction, Direction::NoTrade);
        assert_eq!(r.reason.as_deref(), Some("analysis error: zero risk"));
    }

    #[test]
    fn test_direction_serializes_screaming_case() {
        let json = serde_json::to_string(&Direction::NoTrade).unwrap();
        assert_eq!(json, "\"NO_TRADE\"");
        assert_eq!(Direction::Long.as_str(), "LONG");
    }

    #[test]
    fn test_signal_result_json_omits_missing_levels() {
        let mut r = SignalResult::without_levels("BTCUSDT", Direction::Long, 80, "ok");
        r.entry = Some(dec!(100.5));
        let v: serde_json::Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["entry"], "100.5");
        assert!(v.get("stop_loss").is_none());
    }
}
