//! Fixed-fractional position sizing.
//!
//! The account risks a fixed percentage of balance on every trade; the size
//! follows from the entry/stop distance.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::RiskConfig;
use crate::types::PositionSize;

/// Decimal places reported for the maximum loss (quote currency).
const MAX_LOSS_DP: u32 = 2;
/// Decimal places reported for the position size (base units).
const SIZE_DP: u32 = 4;

/// `max_loss = balance * risk_percent / 100`, `size = max_loss / |entry - stop|`.
///
/// A zero stop distance yields size 0 rather than dividing by zero.
pub fn position_size(
    risk_percent: Decimal,
    balance: Decimal,
    entry: Decimal,
    stop: Decimal,
) -> PositionSize {
    let max_loss = balance * risk_percent / dec!(100);
    let distance = (entry - stop).abs();

    let size = if distance.is_zero() {
        Decimal::ZERO
    } else {
        max_loss / distance
    };

    PositionSize {
        size: fixed(size, SIZE_DP),
        max_loss: fixed(max_loss, MAX_LOSS_DP),
    }
}

/// Round to `dp` places and pin the scale so `20` reports as `20.00`.
fn fixed(value: Decimal, dp: u32) -> Decimal {
    let mut out = value.round_dp(dp);
    out.rescale(dp);
    out
}

/// [`position_size`] with the configured risk percent and balance.
pub fn size_for(risk: &RiskConfig, entry: Decimal, stop: Decimal) -> PositionSize {
    position_size(risk.risk_percent, risk.account_balance, entry, stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sizing() {
        let p = position_size(dec!(2), dec!(1000), dec!(100), dec!(99));
        assert_eq!(p.max_loss, dec!(20.00));
        assert_eq!(p.size, dec!(20.0000));
        assert_eq!(p.max_loss.to_string(), "20.00");
        assert_eq!(p.size.to_string(), "20.0000");
    }

    #[test]
    fn test_short_side_uses_absolute_distance() {
        let p = position_size(dec!(1), dec!(5000), dec!(200), dec!(204));
        assert_eq!(p.max_loss, dec!(50));
        assert_eq!(p.size, dec!(12.5));
    }

    #[test]
    fn test_zero_distance_gives_zero_size() {
        let p = position_size(dec!(2), dec!(1000), dec!(100), dec!(100));
        assert_eq!(p.size, Decimal::ZERO);
        assert_eq!(p.max_loss, dec!(20));
    }

    #[test]
    fn test_size_rounds_to_four_places() {
        let p = position_size(dec!(2), dec!(1000), dec!(100), dec!(97));
        assert_eq!(p.size, dec!(6.6667));
    }

    #[test]
    fn test_size_for_uses_config() {
        let risk = RiskConfig::default();
        let p = size_for(&risk, dec!(100), dec!(99));
        assert_eq!(p.size, dec!(20));
    }
}
