//! Swing structure detection.
//!
//! Pure functions over an oldest-first candle sequence:
//!   - swing highs / lows over a symmetric lookback window
//!   - trend from the two most recent swings of each kind
//!   - break of structure (BOS) and change of character (CHoCH)

use std::ops::Range;

use rust_decimal::Decimal;

use crate::config::StructureParams;
use crate::types::{Candle, MarketStructure, SwingPoint, Trend};

/// Detect the swing structure of `candles`.
///
/// Sequences shorter than `params.min_candles` yield an empty, neutral
/// structure.
pub fn detect(candles: &[Candle], params: &StructureParams) -> MarketStructure {
    if candles.len() < params.min_candles {
        return MarketStructure::neutral();
    }

    let swing_highs = swing_highs(candles, params.swing_lookback);
    let swing_lows = swing_lows(candles, params.swing_lookback);

    let trend = trend_from_swings(&swing_highs, &swing_lows);
    let break_of_structure = break_of_structure(trend, &swing_highs, &swing_lows);
    let change_of_character = change_of_character(trend, &swing_highs, &swing_lows);

    MarketStructure {
        swing_highs,
        swing_lows,
        trend,
        break_of_structure,
        change_of_character,
    }
}

// ---------------------------------------------------------------------------
// Swings
// ---------------------------------------------------------------------------

/// Indices whose high strictly exceeds every other high within `lookback`
/// candles on each side. The window is truncated at the sequence bounds.
pub fn swing_highs(candles: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    swings_in(candles, lookback, 0..candles.len(), |c| c.high, |a, b| a > b)
}

/// Mirror of [`swing_highs`] on lows.
pub fn swing_lows(candles: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    swings_in(candles, lookback, 0..candles.len(), |c| c.low, |a, b| a < b)
}

/// Swing scan restricted to `range`; shared with liquidity detection.
pub(crate) fn swings_in<F, C>(
    candles: &[Candle],
    lookback: usize,
    range: Range<usize>,
    price: F,
    dominates: C,
) -> Vec<SwingPoint>
where
    F: Fn(&Candle) -> Decimal,
    C: Fn(Decimal, Decimal) -> bool,
{
    let n = candles.len();
    let mut out = Vec::new();

    for i in range.filter(|&i| i < n) {
        let p = price(&candles[i]);
        let lo = i.saturating_sub(lookback);
        let hi = (i + lookback).min(n - 1);

        let is_swing = (lo..=hi)
            .filter(|&j| j != i)
            .all(|j| dominates(p, price(&candles[j])));

        if is_swing {
            out.push(SwingPoint {
                index: i,
                price: p,
                timestamp: candles[i].timestamp,
            });
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Trend / BOS / CHoCH
// ---------------------------------------------------------------------------

/// Bullish when the last two highs and last two lows both rise, bearish when
/// both fall. Needs at least two of each.
pub fn trend_from_swings(highs: &[SwingPoint], lows: &[SwingPoint]) -> Trend {
    let (Some(h), Some(l)) = (last_n(highs, 2), last_n(lows, 2)) else {
        return Trend::Neutral;
    };

    let higher_high = h[1].price > h[0].price;
    let higher_low = l[1].price > l[0].price;
    let lower_high = h[1].price < h[0].price;
    let lower_low = l[1].price < l[0].price;

    if higher_high && higher_low {
        Trend::Bullish
    } else if lower_high && lower_low {
        Trend::Bearish
    } else {
        Trend::Neutral
    }
}

/// Three consecutive rising highs in a bullish trend, or three falling lows
/// in a bearish one.
pub fn break_of_structure(trend: Trend, highs: &[SwingPoint], lows: &[SwingPoint]) -> bool {
    let (Some(h), Some(l)) = (last_n(highs, 3), last_n(lows, 3)) else {
        return false;
    };

    match trend {
        Trend::Bullish => h[0].price < h[1].price && h[1].price < h[2].price,
        Trend::Bearish => l[0].price > l[1].price && l[1].price > l[2].price,
        Trend::Neutral => false,
    }
}

/// In a bullish trend: the middle of the last three lows undercut the first,
/// then the latest recovered above it. Mirrored on highs for bearish.
pub fn change_of_character(trend: Trend, highs: &[SwingPoint], lows: &[SwingPoint]) -> bool {
    let (Some(h), Some(l)) = (last_n(highs, 3), last_n(lows, 3)) else {
        return false;
    };

    match trend {
        Trend::Bullish => l[1].price < l[0].price && l[2].price > l[0].price,
        Trend::Bearish => h[1].price > h[0].price && h[2].price < h[0].price,
        Trend::Neutral => false,
    }
}

fn last_n(points: &[SwingPoint], n: usize) -> Option<&[SwingPoint]> {
    points.len().checked_sub(n).map(|start| &points[start..])
}
