use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Directional trend read from swing structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Trend {
    /// `+1` bullish, `-1` bearish, `0` neutral.
    #[must_use]
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Bullish => Decimal::ONE,
            Self::Bearish => Decimal::NEGATIVE_ONE,
            Self::Neutral => Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn is_neutral(&self) -> bool {
        matches!(self, Self::Neutral)
    }
}

/// A local extremum over a fixed lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// Index into the candle sequence the swing was detected on.
    pub index: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub timestamp: i64,
}

/// Swing structure of one candle sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketStructure {
    pub swing_highs: Vec<SwingPoint>,
    pub swing_lows: Vec<SwingPoint>,
    pub trend: Trend,
    /// Swing extremes extend progressively in the trend direction.
    pub break_of_structure: bool,
    /// Early reversal: the latest swing failed to extend before recovering.
    pub change_of_character: bool,
}

impl MarketStructure {
    /// Empty neutral structure returned for short sequences.
    #[must_use]
    pub fn neutral() -> Self {
        Self::default()
    }
}
