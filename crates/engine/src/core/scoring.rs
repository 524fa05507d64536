//! Per-timeframe scoring.
//!
//! Two scores are produced for every timeframe:
//!   - a quick heuristic `confidence` (base 50, capped at 95) used to pick the
//!     primary timeframe for level calculation
//!   - a richer `strength` (0-100) that feeds multi-timeframe fusion

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::core::{indicators, patterns, structure};
use crate::types::{
    Candle, LiquidityLevel, MarketStructure, Timeframe, TimeframeAnalysis, VolumeProfile,
};

const QUICK_BASE: Decimal = dec!(50);
const QUICK_TREND: Decimal = dec!(20);
const QUICK_VOLUME: Decimal = dec!(15);
const QUICK_VOLUME_DELTA: Decimal = dec!(1.2);
const QUICK_ORDER_BLOCK: Decimal = dec!(10);
const QUICK_CAP: Decimal = dec!(95);

const RICH_TREND: Decimal = dec!(25);
const RICH_BOS: Decimal = dec!(15);
const RICH_CHOCH: Decimal = dec!(8);
const RICH_VOLUME_SCALE: Decimal = dec!(60);
const RICH_VOLUME_CAP: Decimal = dec!(30);
const RICH_PER_ORDER_BLOCK: Decimal = dec!(4);
const RICH_ORDER_BLOCK_CAP: Decimal = dec!(25);
const RICH_PER_FVG: Decimal = dec!(3);
const RICH_FVG_CAP: Decimal = dec!(20);
const RICH_LIQUIDITY: Decimal = dec!(15);
const RICH_LIQUIDITY_CLOSE: Decimal = dec!(15);
const RICH_CAP: Decimal = dec!(100);

/// Quick single-timeframe confidence.
pub fn quick_confidence(
    structure: &MarketStructure,
    volume: &VolumeProfile,
    order_block_count: usize,
) -> u8 {
    let mut score = QUICK_BASE;
    if !structure.trend.is_neutral() {
        score += QUICK_TREND;
    }
    if volume.volume_delta > QUICK_VOLUME_DELTA {
        score += QUICK_VOLUME;
    }
    if order_block_count > 0 {
        score += QUICK_ORDER_BLOCK;
    }
    to_score(score.min(QUICK_CAP))
}

/// Inputs to [`timeframe_strength`], already filtered to the proximity band.
pub struct StrengthInputs<'a> {
    pub structure: &'a MarketStructure,
    pub volume: &'a VolumeProfile,
    pub order_blocks: usize,
    pub fair_value_gaps: usize,
    pub liquidity: &'a [LiquidityLevel],
    pub price: Decimal,
    pub atr: Decimal,
}

/// Rich per-timeframe score consumed by fusion.
pub fn timeframe_strength(inputs: &StrengthInputs<'_>) -> u8 {
    let mut score = Decimal::ZERO;

    if !inputs.structure.trend.is_neutral() {
        score += RICH_TREND;
    }
    if inputs.structure.break_of_structure {
        score += RICH_BOS;
    }
    if inputs.structure.change_of_character {
        score += RICH_CHOCH;
    }

    let excess = (inputs.volume.volume_delta - Decimal::ONE).max(Decimal::ZERO);
    score += (excess * RICH_VOLUME_SCALE).min(RICH_VOLUME_CAP);

    score += (Decimal::from(inputs.order_blocks as u64) * RICH_PER_ORDER_BLOCK)
        .min(RICH_ORDER_BLOCK_CAP);
    score += (Decimal::from(inputs.fair_value_gaps as u64) * RICH_PER_FVG).min(RICH_FVG_CAP);

    if !inputs.liquidity.is_empty() {
        score += RICH_LIQUIDITY;
        let half_atr = inputs.atr / Decimal::TWO;
        if inputs
            .liquidity
            .iter()
            .any(|l| (l.price - inputs.price).abs() <= half_atr)
        {
            score += RICH_LIQUIDITY_CLOSE;
        }
    }

    to_score(score.min(RICH_CAP))
}

/// Round a bounded score to the nearest integer point.
pub(crate) fn to_score(score: Decimal) -> u8 {
    score
        .clamp(Decimal::ZERO, RICH_CAP)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u8()
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════
// Timeframe analysis
// ═══════════════════════════════════════════════════════════════════════════

/// Run structure, patterns and both scores over one timeframe's candles.
///
/// Returns `None` for an empty sequence; the caller drops that timeframe.
pub fn analyze_timeframe(
    timeframe: Timeframe,
    candles: &[Candle],
    config: &AnalysisConfig,
) -> Option<TimeframeAnalysis> {
    let price = candles.last()?.close;
    let pat = &config.patterns;

    let structure = structure::detect(candles, &config.structure);
    let volume_profile = patterns::volume_profile(candles, pat);
    let atr = indicators::atr_or_fallback(candles, config.structure.atr_period, price);

    let order_blocks =
        patterns::zones_near(&patterns::order_blocks(candles, pat), price, pat.proximity_pct);
    let fair_value_gaps =
        patterns::zones_near(&patterns::fair_value_gaps(candles, pat), price, pat.proximity_pct);
    let liquidity_levels =
        patterns::levels_near(&patterns::liquidity_levels(candles, pat), price, pat.proximity_pct);

    let confidence = quick_confidence(&structure, &volume_profile, order_blocks.len());
    let strength = timeframe_strength(&StrengthInputs {
        structure: &structure,
        volume: &volume_profile,
        order_blocks: order_blocks.len(),
        fair_value_gaps: fair_value_gaps.len(),
        liquidity: &liquidity_levels,
        price,
        atr,
    });

    debug!(
        timeframe = %timeframe,
        candles = candles.len(),
        %price,
        trend = ?structure.trend,
        bos = structure.break_of_structure,
        choch = structure.change_of_character,
        order_blocks = order_blocks.len(),
        fvgs = fair_value_gaps.len(),
        liquidity = liquidity_levels.len(),
        volume_delta = %volume_profile.volume_delta.round_dp(3),
        atr = %atr.round_dp(6),
        confidence,
        strength,
        "timeframe analyzed"
    );

    Some(TimeframeAnalysis {
        timeframe,
        price,
        trend: structure.trend,
        strength,
        structure,
        order_blocks,
        fair_value_gaps,
        liquidity_levels,
        volume_profile,
        atr,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LiquidityKind, LiquidityStrength, Trend};

    fn trending(bos: bool, choch: bool) -> MarketStructure {
        MarketStructure {
            trend: Trend::Bullish,
            break_of_structure: bos,
            change_of_character: choch,
            ..MarketStructure::default()
        }
    }

    fn profile(delta: Decimal) -> VolumeProfile {
        VolumeProfile {
            volume_delta: delta,
            ..VolumeProfile::default()
        }
    }

    #[test]
    fn test_quick_confidence_base() {
        assert_eq!(quick_confidence(&MarketStructure::neutral(), &profile(dec!(1)), 0), 50);
    }

    #[test]
    fn test_quick_confidence_capped_at_95() {
        assert_eq!(quick_confidence(&trending(false, false), &profile(dec!(2)), 3), 95);
    }

    #[test]
    fn test_quick_confidence_delta_must_exceed() {
        assert_eq!(quick_confidence(&trending(false, false), &profile(dec!(1.2)), 0), 70);
    }

    #[test]
    fn test_strength_components() {
        let s = trending(true, true);
        let v = profile(dec!(1.25)); // 0.25 * 60 = 15
        let levels = vec![LiquidityLevel {
            kind: LiquidityKind::Support,
            price: dec!(99),
            timestamp: 0,
            strength: LiquidityStrength::Strong,
        }];
        let score = timeframe_strength(&StrengthInputs {
            structure: &s,
            volume: &v,
            order_blocks: 2,
            fair_value_gaps: 1,
            liquidity: &levels,
            price: dec!(100),
            atr: dec!(4),
        });
        // 25 + 15 + 8 + 15 + 8 + 3 + 15 + 15
        assert_eq!(score, 100);
    }

    #[test]
    fn test_strength_partial_sum() {
        let s = trending(false, false);
        let score = timeframe_strength(&StrengthInputs {
            structure: &s,
            volume: &profile(dec!(0.5)),
            order_blocks: 10,
            fair_value_gaps: 0,
            liquidity: &[],
            price: dec!(100),
            atr: dec!(1),
        });
        // 25 trend + min(25, 40) order blocks
        assert_eq!(score, 50);
    }

    #[test]
    fn test_liquidity_outside_half_atr_scores_once() {
        let s = MarketStructure::neutral();
        let levels = vec![LiquidityLevel {
            kind: LiquidityKind::Resistance,
            price: dec!(103),
            timestamp: 0,
            strength: LiquidityStrength::Strong,
        }];
        let score = timeframe_strength(&StrengthInputs {
            structure: &s,
            volume: &profile(dec!(1)),
            order_blocks: 0,
            fair_value_gaps: 0,
            liquidity: &levels,
            price: dec!(100),
            atr: dec!(2),
        });
        assert_eq!(score, 15);
    }

    #[test]
    fn test_to_score_rounds_half_up() {
        assert_eq!(to_score(dec!(60.5)), 61);
        assert_eq!(to_score(dec!(-3)), 0);
        assert_eq!(to_score(dec!(140)), 100);
    }

    #[test]
    fn test_analyze_timeframe_empty_is_none() {
        assert!(analyze_timeframe(Timeframe::H1, &[], &AnalysisConfig::default()).is_none());
    }

    #[test]
    fn test_analyze_timeframe_constant_prices_bounded() {
        let candles: Vec<Candle> = (0..50)
            .map(|i| Candle {
                timestamp: i,
                open: dec!(100),
                high: dec!(100),
                low: dec!(100),
                close: dec!(100),
                volume: dec!(1),
            })
            .collect();
        let a = analyze_timeframe(Timeframe::H4, &candles, &AnalysisConfig::default()).unwrap();
        assert_eq!(a.trend, Trend::Neutral);
        assert_eq!(a.confidence, 50);
        assert_eq!(a.strength, 0);
        assert_eq!(a.atr, dec!(0.5));
        assert_eq!(a.price, dec!(100));
    }
}
