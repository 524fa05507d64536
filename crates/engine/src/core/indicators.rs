//! Pure computation helpers over candle sequences.
//!
//! No I/O, no side effects. Everything is `Decimal`.
//!
//! - True range and Average True Range (Wilder's smoothing)
//! - ATR with fallbacks for short or flat sequences
//! - Simple mean over a slice
//!
//! References:
//!     Wilder (1978), "New Concepts in Technical Trading Systems".

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::Candle;

/// Fraction of price used as ATR when no candle has a range.
const FLAT_ATR_FRACTION: Decimal = dec!(0.005);

// ═══════════════════════════════════════════════════════════════════════════
// Volatility
// ═══════════════════════════════════════════════════════════════════════════

/// True ranges for `candles[1..]`.
///
/// `TR = max(H-L, |H-prevC|, |L-prevC|)`.
pub fn true_ranges(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            let hl = cur.high - cur.low;
            let hc = (cur.high - prev.close).abs();
            let lc = (cur.low - prev.close).abs();
            hl.max(hc).max(lc)
        })
        .collect()
}

/// Average True Range (Wilder's smoothing).
///
/// Returns `Decimal::ZERO` on insufficient data (`len < period + 1`).
pub fn atr(candles: &[Candle], period: usize) -> Decimal {
    if period == 0 || candles.len() < period + 1 {
        return Decimal::ZERO;
    }

    let trs = true_ranges(candles);
    let period_d = Decimal::from(period as u64);
    let period_m1 = Decimal::from(period as u64 - 1);

    // First ATR = simple average of first `period` TRs.
    let mut atr_val = mean(&trs[..period]);

    for &tr in &trs[period..] {
        atr_val = (atr_val * period_m1 + tr) / period_d;
    }

    atr_val
}

/// ATR that is positive whenever `price` is.
///
/// Falls back to the mean true range of whatever candles exist (the single
/// candle's range when only one is present), then to `price * 0.005`.
pub fn atr_or_fallback(candles: &[Candle], period: usize, price: Decimal) -> Decimal {
    let wilder = atr(candles, period);
    if wilder > Decimal::ZERO {
        return wilder;
    }

    let short = match candles {
        [] => Decimal::ZERO,
        [only] => only.range(),
        _ => mean(&true_ranges(candles)),
    };
    if short > Decimal::ZERO {
        return short;
    }

    (price * FLAT_ATR_FRACTION).abs()
}

// ═══════════════════════════════════════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════════════════════════════════════

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().copied().sum::<Decimal>() / Decimal::from(values.len() as u64)
}
