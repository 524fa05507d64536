use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Data provider endpoints
// ---------------------------------------------------------------------------

pub const BINANCE_FUTURES_BASE: &str = "https://fapi.binance.com";
pub const BINANCE_SPOT_BASE: &str = "https://api.binance.com";
pub const BYBIT_BASE: &str = "https://api.bybit.com";

pub const DEFAULT_PROVIDER_TIMEOUT_SECONDS: u64 = 10;

/// Fixed cooldown after a 403/418/429 before moving to the next provider.
pub const DEFAULT_RATE_LIMIT_COOLDOWN_MS: u64 = 2_000;

/// HTTP statuses treated as soft rate limits.
pub const RATE_LIMIT_STATUSES: [u16; 3] = [403, 418, 429];

// ---------------------------------------------------------------------------
// Risk defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_RISK_PERCENT: Decimal = dec!(2);
pub const DEFAULT_ACCOUNT_BALANCE: Decimal = dec!(1000);

// ---------------------------------------------------------------------------
// Result reasons
// ---------------------------------------------------------------------------

pub const REASON_NO_DATA: &str = "No data";
pub const REASON_LOW_CONFIDENCE: &str = "Low confidence";
pub const REASON_NO_BIAS: &str = "No clear directional bias";
