//! Timeframe types for multi-timeframe analysis.
//!
//! Four horizons from 15-minute to daily candles, with the interval codes
//! each data provider expects and the default fusion weights.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported analysis timeframes.
///
/// Ordered from shortest to longest for iteration purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    /// 15-minute candles (entry refinement)
    M15,
    /// 1-hour candles (momentum)
    H1,
    /// 4-hour candles (swing structure)
    H4,
    /// Daily candles (trend context)
    D1,
}

impl Timeframe {
    /// All timeframes in ascending order (shortest to longest).
    pub const ALL: [Timeframe; 4] = [Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1];

    /// Binance kline interval string representation.
    #[must_use]
    pub fn as_binance_interval(&self) -> &'static str {
        match self {
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
            Self::D1 => "1d",
        }
    }

    /// Bybit v5 kline interval code.
    #[must_use]
    pub fn as_bybit_interval(&self) -> &'static str {
        match self {
            Self::M15 => "15",
            Self::H1 => "60",
            Self::H4 => "240",
            Self::D1 => "D",
        }
    }

    /// Default weight in multi-timeframe fusion.
    ///
    /// Longer horizons carry more weight.
    #[must_use]
    pub fn default_weight(&self) -> Decimal {
        match self {
            Self::M15 => dec!(0.8),
            Self::H1 => dec!(1.1),
            Self::H4 => dec!(1.3),
            Self::D1 => dec!(1.5),
        }
    }

    /// Default number of historical candles requested per fetch.
    #[must_use]
    pub const fn default_candle_limit(&self) -> u32 {
        match self {
            Self::M15 => 200,
            Self::H1 => 200,
            Self::H4 => 150,
            Self::D1 => 100,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_binance_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_binance_interval() {
        assert_eq!(Timeframe::M15.as_binance_interval(), "15m");
        assert_eq!(Timeframe::D1.as_binance_interval(), "1d");
        assert_eq!(Timeframe::H4.as_binance_interval(), "4h");
    }

    #[test]
    fn test_timeframe_bybit_translation() {
        assert_eq!(Timeframe::D1.as_bybit_interval(), "D");
        assert_eq!(Timeframe::H4.as_bybit_interval(), "240");
        assert_eq!(Timeframe::H1.as_bybit_interval(), "60");
        assert_eq!(Timeframe::M15.as_bybit_interval(), "15");
    }

    #[test]
    fn test_longer_horizons_weighted_higher() {
        let weights: Vec<Decimal> = Timeframe::ALL.iter().map(|tf| tf.default_weight()).collect();
        assert!(weights.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_timeframe_ordering() {
        assert!(Timeframe::M15 < Timeframe::H1);
        assert!(Timeframe::H4 < Timeframe::D1);
    }

    #[test]
    fn test_display_uses_binance_code() {
        assert_eq!(Timeframe::H1.to_string(), "1h");
    }
}
