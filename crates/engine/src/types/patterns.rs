use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a price zone (order block or fair value gap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Bullish,
    Bearish,
}

/// A candle preceding a strong follow-through candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub kind: ZoneKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub strength: Decimal,
}

/// A 3-candle imbalance left unfilled by the middle candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub kind: ZoneKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub strength: Decimal,
}

/// Price zones share the straddle and proximity checks.
pub trait PriceZone {
    fn zone_high(&self) -> Decimal;
    fn zone_low(&self) -> Decimal;

    /// `low <= price <= high`.
    fn contains(&self, price: Decimal) -> bool {
        self.zone_low() <= price && price <= self.zone_high()
    }

    fn midpoint(&self) -> Decimal {
        (self.zone_high() + self.zone_low()) / Decimal::TWO
    }
}

impl PriceZone for OrderBlock {
    fn zone_high(&self) -> Decimal {
        self.high
    }
    fn zone_low(&self) -> Decimal {
        self.low
    }
}

impl PriceZone for FairValueGap {
    fn zone_high(&self) -> Decimal {
        self.high
    }
    fn zone_low(&self) -> Decimal {
        self.low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityKind {
    Support,
    Resistance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityStrength {
    Strong,
}

/// Resting liquidity at a swing extreme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLevel {
    pub kind: LiquidityKind,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub timestamp: i64,
    pub strength: LiquidityStrength,
}

/// Volume distribution summary of one candle sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    /// Price level with the highest accumulated volume.
    #[serde(with = "rust_decimal::serde::str")]
    pub point_of_control: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_volume: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub average_volume: Decimal,
    /// Recent mean volume over the preceding baseline mean (1 when undefined).
    #[serde(with = "rust_decimal::serde::str")]
    pub volume_delta: Decimal,
}

impl Default for VolumeProfile {
    fn default() -> Self {
        Self {
            point_of_control: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            average_volume: Decimal::ZERO,
            volume_delta: Decimal::ONE,
        }
    }
}
