//! Entry, stop-loss and take-profit derivation.
//!
//! Levels are computed on the primary timeframe and then passed through
//! [`validate_levels`], whose final risk/reward clamp is authoritative:
//! every returned [`TradeLevels`] has `min_risk_reward <= risk_reward <=
//! max_risk_reward`.

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::LevelParams;
use crate::errors::EngineError;
use crate::types::{
    Direction, LiquidityKind, LiquidityLevel, PriceZone, TimeframeAnalysis, TradeLevels,
    ZoneKind,
};

/// Decimal places reported for risk/reward.
const RR_DP: u32 = 2;

/// Compute validated trade levels for a tradeable `direction`.
pub fn calculate_levels(
    direction: Direction,
    price: Decimal,
    primary: &TimeframeAnalysis,
    params: &LevelParams,
) -> Result<TradeLevels, EngineError> {
    let side = Side::from_direction(direction)?;
    let atr = primary.atr;

    let entry = select_entry(side, price, primary, params);
    let stop = select_stop(side, entry, atr, &primary.liquidity_levels, params);
    let target = select_target(side, entry, stop, atr, &primary.liquidity_levels, params);

    debug!(
        direction = direction.as_str(),
        %entry,
        %stop,
        %target,
        %atr,
        "raw levels"
    );

    validate_levels(direction, entry, stop, target, atr, params)
}

/// Pull stop and target inside ATR distance bounds, then clamp the target so
/// risk/reward lands in `[min_risk_reward, max_risk_reward]`.
///
/// Risk is re-derived after the stop moves. Applying this to its own output
/// returns the same levels.
pub fn validate_levels(
    direction: Direction,
    entry: Decimal,
    mut stop: Decimal,
    mut target: Decimal,
    atr: Decimal,
    params: &LevelParams,
) -> Result<TradeLevels, EngineError> {
    let side = Side::from_direction(direction)?;
    let max_distance = atr * params.max_distance_atr;

    if (entry - stop).abs() > max_distance {
        stop = side.toward_risk(entry, atr * params.fallback_stop_atr);
    }
    if (target - entry).abs() > max_distance {
        target = side.toward_reward(entry, atr * params.fallback_target_atr);
    }

    let risk = side.sign() * (entry - stop);
    if risk <= Decimal::ZERO {
        return Err(EngineError::Analysis(format!(
            "non-positive risk: entry {entry}, stop {stop}"
        )));
    }

    let reward = side.sign() * (target - entry);
    let rr = reward / risk;
    if rr < params.min_risk_reward {
        target = side.toward_reward(entry, risk * params.min_risk_reward);
    } else if rr > params.max_risk_reward {
        target = side.toward_reward(entry, risk * params.max_risk_reward);
    }

    let mut risk_reward = (side.sign() * (target - entry) / risk).round_dp(RR_DP);
    risk_reward.rescale(RR_DP);

    Ok(TradeLevels {
        entry,
        stop_loss: stop,
        take_profit: target,
        risk_reward,
    })
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Order block straddling price, then FVG containing price, then the nearest
/// liquidity on the entry side, then a small offset from market.
fn select_entry(
    side: Side,
    price: Decimal,
    primary: &TimeframeAnalysis,
    params: &LevelParams,
) -> Decimal {
    let zone = side.zone_kind();

    let block = primary
        .order_blocks
        .iter()
        .filter(|ob| ob.kind == zone && ob.contains(price))
        .max_by(|a, b| {
            a.strength
                .cmp(&b.strength)
                .then_with(|| (b.midpoint() - price).abs().cmp(&(a.midpoint() - price).abs()))
        });
    if let Some(ob) = block {
        return match side {
            Side::Long => ob.low * (Decimal::ONE - params.order_block_entry_offset),
            Side::Short => ob.high * (Decimal::ONE + params.order_block_entry_offset),
        };
    }

    let gap = primary
        .fair_value_gaps
        .iter()
        .find(|g| g.kind == zone && g.contains(price));
    if let Some(g) = gap {
        return match side {
            Side::Long => g.low.max(price * (Decimal::ONE - params.fvg_entry_offset)),
            Side::Short => g.high.min(price * (Decimal::ONE + params.fvg_entry_offset)),
        };
    }

    let liquidity = nearest_beyond(
        side.risk_liquidity(),
        &primary.liquidity_levels,
        price,
        side,
        None,
    );
    if let Some(level) = liquidity {
        return match side {
            Side::Long => level * (Decimal::ONE + params.liquidity_entry_offset),
            Side::Short => level * (Decimal::ONE - params.liquidity_entry_offset),
        };
    }

    match side {
        Side::Long => price * (Decimal::ONE - params.market_entry_offset),
        Side::Short => price * (Decimal::ONE + params.market_entry_offset),
    }
}

/// Nearest risk-side level within `stop_search_atr`, buffered to at least
/// `stop_buffer_atr` away from entry.
fn select_stop(
    side: Side,
    entry: Decimal,
    atr: Decimal,
    levels: &[LiquidityLevel],
    params: &LevelParams,
) -> Decimal {
    let window = atr * params.stop_search_atr;
    match nearest_beyond(side.risk_liquidity(), levels, entry, side, Some(window)) {
        Some(level) => {
            let buffered = side.toward_risk(entry, atr * params.stop_buffer_atr);
            match side {
                Side::Long => level.min(buffered),
                Side::Short => level.max(buffered),
            }
        }
        None => side.toward_risk(entry, atr * params.default_stop_atr),
    }
}

/// Nearest reward-side level within `target_search_atr`, else a default ATR
/// multiple, then clamped into the risk/reward band.
fn select_target(
    side: Side,
    entry: Decimal,
    stop: Decimal,
    atr: Decimal,
    levels: &[LiquidityLevel],
    params: &LevelParams,
) -> Decimal {
    let window = atr * params.target_search_atr;
    let opposite = side.opposite();
    let raw = nearest_beyond(side.reward_liquidity(), levels, entry, opposite, Some(window))
        .unwrap_or_else(|| side.toward_reward(entry, atr * params.default_target_atr));

    let risk = (entry - stop).abs();
    let near = side.toward_reward(entry, risk * params.min_risk_reward);
    let far = side.toward_reward(entry, risk * params.max_risk_reward);
    let (lo, hi) = if near <= far { (near, far) } else { (far, near) };
    raw.clamp(lo, hi)
}

/// Closest level of `kind` strictly on the risk side of `from` for `side`
/// (below for long, above for short), optionally within `window`.
fn nearest_beyond(
    kind: LiquidityKind,
    levels: &[LiquidityLevel],
    from: Decimal,
    side: Side,
    window: Option<Decimal>,
) -> Option<Decimal> {
    levels
        .iter()
        .filter(|l| l.kind == kind)
        .map(|l| side.sign() * (from - l.price))
        .filter(|&dist| dist > Decimal::ZERO && window.map_or(true, |w| dist <= w))
        .min()
        .map(|dist| from - side.sign() * dist)
}

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Long,
    Short,
}

impl Side {
    fn from_direction(direction: Direction) -> Result<Self, EngineError> {
        match direction {
            Direction::Long => Ok(Self::Long),
            Direction::Short => Ok(Self::Short),
            other => Err(EngineError::Analysis(format!(
                "levels requested for {}",
                other.as_str()
            ))),
        }
    }

    fn sign(self) -> Decimal {
        match self {
            Self::Long => Decimal::ONE,
            Self::Short => Decimal::NEGATIVE_ONE,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }

    fn zone_kind(self) -> ZoneKind {
        match self {
            Self::Long => ZoneKind::Bullish,
            Self::Short => ZoneKind::Bearish,
        }
    }

    fn risk_liquidity(self) -> LiquidityKind {
        match self {
            Self::Long => LiquidityKind::Support,
            Self::Short => LiquidityKind::Resistance,
        }
    }

    fn reward_liquidity(self) -> LiquidityKind {
        match self {
            Self::Long => LiquidityKind::Resistance,
            Self::Short => LiquidityKind::Support,
        }
    }

    fn toward_risk(self, from: Decimal, distance: Decimal) -> Decimal {
        from - self.sign() * distance
    }

    fn toward_reward(self, from: Decimal, distance: Decimal) -> Decimal {
        from + self.sign() * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FairValueGap, LiquidityStrength, MarketStructure, OrderBlock, Timeframe, Trend,
        VolumeProfile,
    };
    use rust_decimal_macros::dec;

    fn params() -> LevelParams {
        LevelParams::default()
    }

    fn analysis(atr: Decimal) -> TimeframeAnalysis {
        TimeframeAnalysis {
            timeframe: Timeframe::H4,
            price: dec!(100),
            trend: Trend::Bullish,
            strength: 80,
            structure: MarketStructure::neutral(),
            order_blocks: Vec::new(),
            fair_value_gaps: Vec::new(),
            liquidity_levels: Vec::new(),
            volume_profile: VolumeProfile::default(),
            atr,
            confidence: 80,
        }
    }

    fn liq(kind: LiquidityKind, price: Decimal) -> LiquidityLevel {
        LiquidityLevel {
            kind,
            price,
            timestamp: 0,
            strength: LiquidityStrength::Strong,
        }
    }

    fn assert_rr_bounded(l: &TradeLevels) {
        assert!(l.risk_reward >= dec!(1.5) && l.risk_reward <= dec!(2.5), "rr {}", l.risk_reward);
    }

    #[test]
    fn test_clamp_reduces_take_profit_to_max_rr() {
        let (entry, stop, tp) = (dec!(100), dec!(99), dec!(103));
        let l = validate_levels(Direction::Long, entry, stop, tp, dec!(2), &params()).unwrap();
        assert_eq!(l.take_profit, dec!(102.5));
        assert_eq!(l.risk_reward.to_string(), "2.50");
        assert_eq!(l.stop_loss, dec!(99));
    }

    #[test]
    fn test_clamp_raises_take_profit_to_min_rr() {
        let (entry, stop, tp) = (dec!(100), dec!(102), dec!(99));
        let l = validate_levels(Direction::Short, entry, stop, tp, dec!(2), &params()).unwrap();
        assert_eq!(l.take_profit, dec!(97));
        assert_eq!(l.risk_reward, dec!(1.50));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let cases = [
            (Direction::Long, dec!(100), dec!(99), dec!(103), dec!(2)),
            (Direction::Long, dec!(100), dec!(90), dec!(101), dec!(2)),
            (Direction::Short, dec!(100), dec!(104.5), dec!(92), dec!(2)),
            (Direction::Short, dec!(50), dec!(50.3), dec!(49.5), dec!(0.4)),
        ];
        for (dir, entry, stop, tp, atr) in cases {
            let once = validate_levels(dir, entry, stop, tp, atr, &params()).unwrap();
            let twice =
                validate_levels(dir, once.entry, once.stop_loss, once.take_profit, atr, &params())
                    .unwrap();
            assert_eq!(once, twice);
            assert_rr_bounded(&once);
        }
    }

    #[test]
    fn test_wide_stop_pulled_to_one_atr() {
        let (entry, stop, tp) = (dec!(100), dec!(90), dec!(101));
        let l = validate_levels(Direction::Long, entry, stop, tp, dec!(2), &params()).unwrap();
        assert_eq!(l.stop_loss, dec!(98));
        assert_eq!(l.take_profit, dec!(103));
        assert_eq!(l.risk_reward, dec!(1.50));
    }

    #[test]
    fn test_zero_risk_is_error() {
        let (entry, stop, tp) = (dec!(100), dec!(100), dec!(101));
        let err = validate_levels(Direction::Long, entry, stop, tp, Decimal::ZERO, &params())
            .unwrap_err();
        assert!(matches!(err, EngineError::Analysis(_)));
    }

    #[test]
    fn test_non_tradeable_direction_is_error() {
        let err = calculate_levels(Direction::Neutral, dec!(100), &analysis(dec!(1)), &params())
            .unwrap_err();
        assert!(err.to_string().contains("NEUTRAL"));
    }

    #[test]
    fn test_market_entry_fallback_long() {
        let l =
            calculate_levels(Direction::Long, dec!(100), &analysis(dec!(1)), &params()).unwrap();
        assert_eq!(l.entry, dec!(99.8));
        // default stop 0.8 ATR, default target 0.8 ATR clamped up to 1.5R
        assert_eq!(l.stop_loss, dec!(99.0));
        assert_eq!(l.take_profit, dec!(101.0));
        assert_eq!(l.risk_reward, dec!(1.50));
    }

    #[test]
    fn test_order_block_entry_prefers_strength_then_proximity() {
        let mut a = analysis(dec!(1));
        let ob = |low, high, strength| OrderBlock {
            kind: ZoneKind::Bullish,
            high,
            low,
            timestamp: 0,
            strength,
        };
        a.order_blocks = vec![
            ob(dec!(95), dec!(101), dec!(0.7)),
            ob(dec!(99), dec!(101), dec!(0.7)),
            ob(dec!(90), dec!(99), dec!(0.9)), // does not straddle
        ];
        let l = calculate_levels(Direction::Long, dec!(100), &a, &params()).unwrap();
        assert_eq!(l.entry, dec!(99) * dec!(0.998));
    }

    #[test]
    fn test_fvg_entry_short() {
        let mut a = analysis(dec!(1));
        a.fair_value_gaps = vec![FairValueGap {
            kind: ZoneKind::Bearish,
            high: dec!(100.2),
            low: dec!(99.5),
            timestamp: 0,
            strength: dec!(0.6),
        }];
        let l = calculate_levels(Direction::Short, dec!(100), &a, &params()).unwrap();
        assert_eq!(l.entry, dec!(100.2));
        assert!(l.stop_loss > l.entry);
        assert!(l.take_profit < l.entry);
        assert_rr_bounded(&l);
    }

    #[test]
    fn test_support_entry_and_structural_stop() {
        let mut a = analysis(dec!(2));
        a.liquidity_levels = vec![
            liq(LiquidityKind::Support, dec!(99)),
            liq(LiquidityKind::Support, dec!(97)),
            liq(LiquidityKind::Resistance, dec!(102)),
        ];
        let l = calculate_levels(Direction::Long, dec!(100), &a, &params()).unwrap();
        assert_eq!(l.entry, dec!(99.099));
        // Nearest support 99 is tighter than the 0.6 ATR buffer.
        assert_eq!(l.stop_loss, dec!(97.899));
        // Resistance 102 is beyond 1.2 ATR, so the default target is clamped to 1.5R.
        assert_eq!(l.take_profit, dec!(100.899));
        assert_rr_bounded(&l);
    }
}
