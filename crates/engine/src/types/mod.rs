pub mod market_data;
pub mod patterns;
pub mod signal;
pub mod structure;
pub mod timeframe;

pub use market_data::Candle;
pub use patterns::{
    FairValueGap, LiquidityKind, LiquidityLevel, LiquidityStrength, OrderBlock, PriceZone,
    VolumeProfile, ZoneKind,
};
pub use signal::{Direction, PositionSize, SignalResult, TimeframeAnalysis, TradeLevels};
pub use structure::{MarketStructure, SwingPoint, Trend};
pub use timeframe::Timeframe;
