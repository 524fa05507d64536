//! Order blocks, fair value gaps, liquidity levels and volume profile.
//!
//! Each detector is a pure function of an oldest-first candle sequence.
//! Proximity filtering against the current price is a separate step so the
//! raw detections stay testable on their own.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::PatternParams;
use crate::core::indicators::mean;
use crate::core::structure::swings_in;
use crate::types::{
    Candle, FairValueGap, LiquidityKind, LiquidityLevel, LiquidityStrength, OrderBlock,
    PriceZone, VolumeProfile, ZoneKind,
};

/// Price quantization for volume buckets, as a fraction of current price.
const VOLUME_TICK_DIVISOR: Decimal = dec!(10000);

// ═══════════════════════════════════════════════════════════════════════════
// Order blocks
// ═══════════════════════════════════════════════════════════════════════════

/// A candle followed by an opposite-direction candle whose body is at least
/// `order_block_body_ratio` times larger marks an order block over the first
/// candle's range. A bearish candle before a bullish displacement is a
/// bullish block, and vice versa.
pub fn order_blocks(candles: &[Candle], params: &PatternParams) -> Vec<OrderBlock> {
    let mut blocks: Vec<OrderBlock> = candles
        .windows(2)
        .filter_map(|w| {
            let (base, next) = (&w[0], &w[1]);
            let threshold = base.body().abs() * params.order_block_body_ratio;

            let kind = if base.is_bearish() && next.is_bullish() && next.body() >= threshold {
                ZoneKind::Bullish
            } else if base.is_bullish() && next.is_bearish() && -next.body() >= threshold {
                ZoneKind::Bearish
            } else {
                return None;
            };

            Some(OrderBlock {
                kind,
                high: base.high,
                low: base.low,
                timestamp: base.timestamp,
                strength: params.order_block_strength,
            })
        })
        .collect();

    keep_last(&mut blocks, params.max_order_blocks);
    blocks
}

// ═══════════════════════════════════════════════════════════════════════════
// Fair value gaps
// ═══════════════════════════════════════════════════════════════════════════

/// Three-candle imbalances. The gap spans from the nearer neighbour extreme
/// to the middle candle's extreme.
pub fn fair_value_gaps(candles: &[Candle], params: &PatternParams) -> Vec<FairValueGap> {
    let mut gaps: Vec<FairValueGap> = candles
        .windows(3)
        .filter_map(|w| {
            let (prev, mid, next) = (&w[0], &w[1], &w[2]);

            let (kind, high, low) = if mid.low > prev.high && mid.low > next.high {
                (ZoneKind::Bullish, mid.low, prev.high.max(next.high))
            } else if mid.high < prev.low && mid.high < next.low {
                (ZoneKind::Bearish, prev.low.min(next.low), mid.high)
            } else {
                return None;
            };

            Some(FairValueGap {
                kind,
                high,
                low,
                timestamp: mid.timestamp,
                strength: params.fvg_strength,
            })
        })
        .collect();

    keep_last(&mut gaps, params.max_fair_value_gaps);
    gaps
}

// ═══════════════════════════════════════════════════════════════════════════
// Liquidity levels
// ═══════════════════════════════════════════════════════════════════════════

/// Tight-lookback swing extremes away from the series edges. Highs rest
/// resistance above, lows rest support below.
pub fn liquidity_levels(candles: &[Candle], params: &PatternParams) -> Vec<LiquidityLevel> {
    let margin = params.liquidity_edge_margin;
    let n = candles.len();
    if n <= margin * 2 {
        return Vec::new();
    }
    let range = margin..n - margin;
    let lookback = params.liquidity_lookback;

    let highs = swings_in(candles, lookback, range.clone(), |c| c.high, |a, b| a > b);
    let lows = swings_in(candles, lookback, range, |c| c.low, |a, b| a < b);

    let mut tagged: Vec<(usize, LiquidityLevel)> = highs
        .into_iter()
        .map(|s| (s.index, level(LiquidityKind::Resistance, s.price, s.timestamp)))
        .chain(
            lows.into_iter()
                .map(|s| (s.index, level(LiquidityKind::Support, s.price, s.timestamp))),
        )
        .collect();
    tagged.sort_by_key(|(index, _)| *index);

    let mut levels: Vec<LiquidityLevel> = tagged.into_iter().map(|(_, l)| l).collect();
    keep_last(&mut levels, params.max_liquidity_levels);
    levels
}

fn level(kind: LiquidityKind, price: Decimal, timestamp: i64) -> LiquidityLevel {
    LiquidityLevel {
        kind,
        price,
        timestamp,
        strength: LiquidityStrength::Strong,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Volume profile
// ═══════════════════════════════════════════════════════════════════════════

/// Spread each candle's volume evenly over `volume_bands` sub-bands of its
/// range and accumulate per quantized price level.
///
/// Buckets are keyed by `round(price / tick)` with `tick = last_close / 10000`.
/// Each bucket remembers the first band price that landed in it, so the
/// point of control is always a price some candle actually traded through.
pub fn volume_profile(candles: &[Candle], params: &PatternParams) -> VolumeProfile {
    let Some(last) = candles.last() else {
        return VolumeProfile::default();
    };

    // Closes too small for the divisor underflow to zero; use a unit tick.
    let tick = Some(last.close)
        .filter(|c| *c > Decimal::ZERO)
        .and_then(|c| c.checked_div(VOLUME_TICK_DIVISOR))
        .filter(|t| !t.is_zero())
        .unwrap_or(Decimal::ONE);
    let bands = Decimal::from(params.volume_bands.max(1));

    let mut buckets: BTreeMap<i64, (Decimal, Decimal)> = BTreeMap::new();
    let mut add = |price: Decimal, volume: Decimal| {
        // Out-of-range quotients are dropped rather than panicking.
        let Some(key) = price.checked_div(tick).and_then(|q| q.round().to_i64()) else {
            return;
        };
        let entry = buckets.entry(key).or_insert((Decimal::ZERO, price));
        entry.0 += volume;
    };

    for c in candles {
        let range = c.range();
        if range <= Decimal::ZERO {
            add(c.close, c.volume);
            continue;
        }
        let step = range / bands;
        let share = c.volume / bands;
        for k in 0..params.volume_bands.max(1) {
            add(c.low + step * Decimal::from(k), share);
        }
    }

    // First maximum in ascending price order wins ties.
    let point_of_control = buckets
        .values()
        .fold(None::<(Decimal, Decimal)>, |best, &(vol, price)| match best {
            Some((best_vol, _)) if best_vol >= vol => best,
            _ => Some((vol, price)),
        })
        .map(|(_, price)| price)
        .unwrap_or(last.close);

    let volumes: Vec<Decimal> = candles.iter().map(|c| c.volume).collect();
    let total_volume: Decimal = volumes.iter().copied().sum();

    VolumeProfile {
        point_of_control,
        total_volume,
        average_volume: mean(&volumes),
        volume_delta: volume_delta(
            &volumes,
            params.volume_recent_window,
            params.volume_baseline_window,
        ),
    }
}

/// Mean of the last `recent` volumes over the mean of the `baseline` volumes
/// before them. 1 when the baseline is empty or zero.
pub fn volume_delta(volumes: &[Decimal], recent: usize, baseline: usize) -> Decimal {
    let n = volumes.len();
    let split = n.saturating_sub(recent);
    let start = split.saturating_sub(baseline);

    let base = mean(&volumes[start..split]);
    if base <= Decimal::ZERO {
        return Decimal::ONE;
    }
    mean(&volumes[split..]) / base
}

// ═══════════════════════════════════════════════════════════════════════════
// Proximity
// ═══════════════════════════════════════════════════════════════════════════

/// Zones overlapping `price * (1 ± pct)`.
pub fn zones_near<Z: PriceZone + Clone>(zones: &[Z], price: Decimal, pct: Decimal) -> Vec<Z> {
    let lower = price * (Decimal::ONE - pct);
    let upper = price * (Decimal::ONE + pct);
    zones
        .iter()
        .filter(|z| z.zone_low() <= upper && z.zone_high() >= lower)
        .cloned()
        .collect()
}

/// Levels within `pct` of `price`, relative to price.
pub fn levels_near(levels: &[LiquidityLevel], price: Decimal, pct: Decimal) -> Vec<LiquidityLevel> {
    if price <= Decimal::ZERO {
        return Vec::new();
    }
    levels
        .iter()
        .filter(|l| {
            (l.price - price)
                .abs()
                .checked_div(price)
                .is_some_and(|d| d <= pct)
        })
        .cloned()
        .collect()
}

fn keep_last<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        items.drain(..items.len() - max);
    }
}
