//! Multi-source candle fetcher with ordered fallback.
//!
//! Sources are tried in ascending priority. The first one that returns a
//! non-empty, well-formed candle series wins. A rate-limit response
//! (403/418/429) costs a fixed cooldown before the next source is tried;
//! the same source is never retried within one fetch.
//!
//! Providers:
//!   - Binance Futures `/fapi/v1/klines`: `[[open_time, O, H, L, C, V, …], …]`
//!   - Binance Spot `/api/v3/klines`: same shape
//!   - Bybit `/v5/market/kline`: `{result: {list: [[start, O, H, L, C, V, …]]}}`,
//!     newest first, interval codes `15/60/240/D`

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ProviderConfig, ProviderKind, ProvidersConfig};
use crate::constants::RATE_LIMIT_STATUSES;
use crate::errors::EngineError;
use crate::types::{Candle, Timeframe};

/// Minimum fields in a kline row: time, open, high, low, close, volume.
const MIN_ROW_FIELDS: usize = 6;

// ═══════════════════════════════════════════════════════════════════════════
// CandleSource
// ═══════════════════════════════════════════════════════════════════════════

/// Anything that can produce an oldest-first candle series.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, EngineError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// HttpProvider
// ═══════════════════════════════════════════════════════════════════════════

/// One configured HTTP kline endpoint.
pub struct HttpProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpProvider {
    /// The client is shared between providers; the timeout is per request.
    pub fn new(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> reqwest::RequestBuilder {
        let base = self.config.base_url.trim_end_matches('/');
        let limit = limit.to_string();

        let builder = match self.config.kind {
            ProviderKind::BinanceFutures => self
                .client
                .get(format!("{base}/fapi/v1/klines"))
                .query(&[
                    ("symbol", symbol),
                    ("interval", timeframe.as_binance_interval()),
                    ("limit", limit.as_str()),
                ]),
            ProviderKind::BinanceSpot => self
                .client
                .get(format!("{base}/api/v3/klines"))
                .query(&[
                    ("symbol", symbol),
                    ("interval", timeframe.as_binance_interval()),
                    ("limit", limit.as_str()),
                ]),
            ProviderKind::Bybit => self
                .client
                .get(format!("{base}/v5/market/kline"))
                .query(&[
                    ("category", "linear"),
                    ("symbol", symbol),
                    ("interval", timeframe.as_bybit_interval()),
                    ("limit", limit.as_str()),
                ]),
        };

        builder.timeout(Duration::from_secs(self.config.timeout_seconds))
    }

    fn unavailable(&self, detail: impl std::fmt::Display) -> EngineError {
        EngineError::DataUnavailable {
            name: format!("{}: {detail}", self.config.name),
        }
    }
}

#[async_trait]
impl CandleSource for HttpProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, EngineError> {
        let start = Instant::now();
        let resp = self
            .request(symbol, timeframe, limit)
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if let Some(err) = classify_status(&self.config.name, resp.status()) {
            return Err(err);
        }

        let payload = resp
            .json::<Value>()
            .await
            .map_err(|e| self.unavailable(e))?;

        let candles = normalize(self.config.kind, self.config.newest_first, &payload)
            .map_err(|detail| self.unavailable(detail))?;

        debug!(
            provider = %self.config.name,
            symbol,
            timeframe = %timeframe,
            candles = candles.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            latest_close = %candles.last().map(|c| c.close).unwrap_or_default(),
            "candles fetched"
        );

        Ok(candles)
    }
}

/// `None` for success. 403/418/429 are rate limits, anything else non-2xx
/// makes the provider unavailable.
fn classify_status(provider: &str, status: StatusCode) -> Option<EngineError> {
    if RATE_LIMIT_STATUSES.contains(&status.as_u16()) {
        return Some(EngineError::RateLimited {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Some(EngineError::DataUnavailable {
            name: format!("{provider}: HTTP {status}"),
        });
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
// DataService (ordered fallback)
// ═══════════════════════════════════════════════════════════════════════════

/// Ordered fallback over several candle sources.
pub struct DataService {
    sources: Vec<Arc<dyn CandleSource>>,
    cooldown: Duration,
}

impl DataService {
    /// Sources are tried in the given order.
    pub fn new(sources: Vec<Arc<dyn CandleSource>>, cooldown: Duration) -> Self {
        Self { sources, cooldown }
    }

    /// Build HTTP providers for every enabled entry, sorted by priority.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().build()?;

        let mut enabled: Vec<&ProviderConfig> =
            config.sources.iter().filter(|p| p.enabled).collect();
        enabled.sort_by_key(|p| p.priority);

        let sources: Vec<Arc<dyn CandleSource>> = enabled
            .into_iter()
            .map(|p| {
                Arc::new(HttpProvider::new(client.clone(), p.clone())) as Arc<dyn CandleSource>
            })
            .collect();

        if sources.is_empty() {
            return Err(EngineError::Config("no enabled data providers".into()));
        }

        debug!(
            providers = ?sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            cooldown_ms = config.rate_limit_cooldown_ms,
            "data service configured"
        );

        Ok(Self::new(
            sources,
            Duration::from_millis(config.rate_limit_cooldown_ms),
        ))
    }
}

#[async_trait]
impl CandleSource for DataService {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, EngineError> {
        let last = self.sources.len().saturating_sub(1);

        for (i, source) in self.sources.iter().enumerate() {
            match source.fetch(symbol, timeframe, limit).await {
                Ok(candles) => return Ok(candles),
                Err(e) => {
                    warn!(
                        provider = source.name(),
                        symbol,
                        timeframe = %timeframe,
                        error = %e,
                        "provider failed, trying next"
                    );
                    if e.is_rate_limited() && i < last {
                        tokio::time::sleep(self.cooldown).await;
                    }
                }
            }
        }

        Err(EngineError::DataUnavailable {
            name: format!(
                "{symbol} {timeframe}: all {} providers failed",
                self.sources.len()
            ),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════════════════════

/// Convert a provider payload into an oldest-first candle series.
///
/// Malformed rows are skipped. An empty result is an error so the caller
/// falls through to the next provider.
pub fn normalize(
    kind: ProviderKind,
    newest_first: bool,
    payload: &Value,
) -> Result<Vec<Candle>, String> {
    let (rows, reverse) = match kind {
        ProviderKind::BinanceFutures | ProviderKind::BinanceSpot => {
            let rows = payload.as_array().ok_or("klines response not an array")?;
            (rows, newest_first)
        }
        ProviderKind::Bybit => {
            if let Some(code) = payload.get("retCode").and_then(Value::as_i64) {
                if code != 0 {
                    let msg = payload.get("retMsg").and_then(Value::as_str).unwrap_or("");
                    return Err(format!("retCode {code}: {msg}"));
                }
            }
            let rows = payload
                .pointer("/result/list")
                .and_then(Value::as_array)
                .ok_or("missing result.list")?;
            (rows, true)
        }
    };

    let mut candles: Vec<Candle> = rows.iter().filter_map(parse_row).collect();
    if reverse {
        candles.reverse();
    }

    if candles.is_empty() {
        return Err("empty candle set".into());
    }
    Ok(candles)
}

/// `[time, open, high, low, close, volume, …]` with numbers or numeric strings.
fn parse_row(row: &Value) -> Option<Candle> {
    let items = row.as_array().filter(|a| a.len() >= MIN_ROW_FIELDS)?;

    let candle = Candle {
        timestamp: parse_i64(&items[0])?,
        open: parse_decimal(&items[1])?,
        high: parse_decimal(&items[2])?,
        low: parse_decimal(&items[3])?,
        close: parse_decimal(&items[4])?,
        volume: parse_decimal(&items[5])?,
    };

    (candle.high >= candle.low).then_some(candle)
}

/// Parse a `serde_json::Value` that may be a number-as-string into `Decimal`.
fn parse_decimal(v: &Value) -> Option<Decimal> {
    v.as_str()
        .and_then(|s| s.parse::<Decimal>().ok())
        .or_else(|| v.as_f64().and_then(Decimal::from_f64))
}

fn parse_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- Normalization -------------------------------------------------------

    #[test]
    fn test_parse_decimal_string_and_number() {
        assert_eq!(parse_decimal(&json!("123.456")), Some(dec!(123.456)));
        assert!(parse_decimal(&json!(42.5)).is_some());
        assert_eq!(parse_decimal(&json!(null)), None);
        assert_eq!(parse_decimal(&json!("abc")), None);
    }

    #[test]
    fn test_binance_flat_oldest_first() {
        let payload = json!([
            [1700000000000i64, "600.0", "605.0", "595.0", "602.0", "1000.0", 1700003599999i64, "0", 100, "0", "0", "0"],
            [1700003600000i64, "602.0", "610.0", "600.0", "608.0", "1200.0", 1700007199999i64, "0", 100, "0", "0", "0"]
        ]);
        let candles = normalize(ProviderKind::BinanceFutures, false, &payload).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1700000000000);
        assert_eq!(candles[1].close, dec!(608.0));
    }

    #[test]
    fn test_flat_newest_first_is_reversed() {
        let payload = json!([
            [2000, "2", "3", "1", "2.5", "10"],
            [1000, "1", "2", "0.5", "1.5", "10"]
        ]);
        let candles = normalize(ProviderKind::BinanceSpot, true, &payload).unwrap();
        assert_eq!(candles[0].timestamp, 1000);
        assert_eq!(candles[1].timestamp, 2000);
    }

    #[test]
    fn test_bybit_nested_list_reversed() {
        let payload = json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "list": [
                    ["1700007200000", "3", "4", "2", "3.5", "30", "0"],
                    ["1700003600000", "2", "3", "1", "2.5", "20", "0"],
                    ["1700000000000", "1", "2", "0.5", "1.5", "10", "0"]
                ]
            }
        });
        let candles = normalize(ProviderKind::Bybit, false, &payload).unwrap();
        let times: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(times, vec![1700000000000, 1700003600000, 1700007200000]);
        assert_eq!(candles[0].volume, dec!(10));
    }

    #[test]
    fn test_bybit_error_code() {
        let payload = json!({ "retCode": 10001, "retMsg": "params error", "result": {} });
        let err = normalize(ProviderKind::Bybit, false, &payload).unwrap_err();
        assert!(err.contains("10001"));
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let payload = json!([
            [1000, "1", "2", "0.5", "1.5"],              // too short
            [2000, "1", "x", "0.5", "1.5", "10"],        // non-numeric
            [3000, "1", "0.4", "0.5", "0.45", "10"],     // high < low
            [4000, "1", "2", "0.5", "1.5", "10"]
        ]);
        let candles = normalize(ProviderKind::BinanceFutures, false, &payload).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].timestamp, 4000);
    }

    #[test]
    fn test_empty_payload_is_error() {
        assert!(normalize(ProviderKind::BinanceSpot, false, &json!([])).is_err());
        assert!(normalize(ProviderKind::BinanceSpot, false, &json!({"code": -1121})).is_err());
    }

    // -- Fallback ------------------------------------------------------------

    enum Behavior {
        Candles(usize),
        RateLimited,
        Fail,
    }

    struct FakeSource {
        name: String,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.into(),
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CandleSource for FakeSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, _: &str, _: Timeframe, _: u32) -> Result<Vec<Candle>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Candles(n) => Ok((0..n as i64)
                    .map(|i| Candle {
                        timestamp: i,
                        open: dec!(1),
                        high: dec!(2),
                        low: dec!(1),
                        close: dec!(1.5),
                        volume: dec!(1),
                    })
                    .collect()),
                Behavior::RateLimited => Err(EngineError::RateLimited {
                    provider: self.name.clone(),
                    status: 429,
                }),
                Behavior::Fail => Err(EngineError::DataUnavailable {
                    name: self.name.clone(),
                }),
            }
        }
    }

    fn sources(list: Vec<Arc<FakeSource>>) -> Vec<Arc<dyn CandleSource>> {
        list.into_iter()
            .map(|s| s as Arc<dyn CandleSource>)
            .collect()
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let a = FakeSource::new("a", Behavior::Candles(3));
        let b = FakeSource::new("b", Behavior::Candles(5));
        let svc = DataService::new(sources(vec![a, b.clone()]), Duration::ZERO);
        let candles = svc.fetch("BTCUSDT", Timeframe::H1, 10).await.unwrap();
        assert_eq!(candles.len(), 3);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_failures_in_order() {
        let a = FakeSource::new("a", Behavior::Fail);
        let b = FakeSource::new("b", Behavior::Fail);
        let c = FakeSource::new("c", Behavior::Candles(2));
        let svc = DataService::new(sources(vec![a.clone(), b.clone(), c]), Duration::ZERO);
        let candles = svc.fetch("BTCUSDT", Timeframe::D1, 10).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_failed_is_data_unavailable() {
        let svc = DataService::new(
            sources(vec![
                FakeSource::new("a", Behavior::Fail),
                FakeSource::new("b", Behavior::RateLimited),
            ]),
            Duration::ZERO,
        );
        let err = svc.fetch("ETHUSDT", Timeframe::M15, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable { .. }));
        assert!(err.to_string().contains("all 2 providers failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_applies_cooldown_once() {
        let a = FakeSource::new("a", Behavior::RateLimited);
        let b = FakeSource::new("b", Behavior::Candles(1));
        let svc = DataService::new(sources(vec![a.clone(), b]), Duration::from_millis(2_000));
        let start = tokio::time::Instant::now();
        svc.fetch("BTCUSDT", Timeframe::H4, 10).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2_000));
        // Not retried.
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_failure_has_no_cooldown() {
        let svc = DataService::new(
            sources(vec![
                FakeSource::new("a", Behavior::Fail),
                FakeSource::new("b", Behavior::Candles(1)),
            ]),
            Duration::from_millis(2_000),
        );
        let start = tokio::time::Instant::now();
        svc.fetch("BTCUSDT", Timeframe::H4, 10).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(2_000));
    }

    // -- Status classification -----------------------------------------------

    #[test]
    fn test_rate_limit_statuses() {
        for code in [403, 418, 429] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_status("binance_futures", status).unwrap();
            assert!(err.is_rate_limited(), "{code} should be a rate limit");
            match err {
                EngineError::RateLimited { provider, status } => {
                    assert_eq!(provider, "binance_futures");
                    assert_eq!(status, code);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_other_failures_are_unavailable() {
        for code in [404, 500, 502] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify_status("bybit", status).unwrap();
            assert!(!err.is_rate_limited());
            match err {
                EngineError::DataUnavailable { name } => {
                    assert!(name.starts_with("bybit: HTTP"));
                    assert!(name.contains(&code.to_string()));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn test_success_is_not_classified() {
        assert!(classify_status("bybit", StatusCode::OK).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cooldown_after_last_source() {
        let svc = DataService::new(
            sources(vec![FakeSource::new("only", Behavior::RateLimited)]),
            Duration::from_millis(2_000),
        );
        let start = tokio::time::Instant::now();
        let err = svc.fetch("BTCUSDT", Timeframe::M15, 10).await.unwrap_err();
        assert!(matches!(err, EngineError::DataUnavailable { .. }));
        assert!(start.elapsed() < Duration::from_millis(2_000));
    }

    #[test]
    fn test_from_config_skips_disabled_and_sorts() {
        let mut config = ProvidersConfig::default();
        config.sources[0].enabled = false;
        config.sources[1].priority = 9;
        let svc = DataService::from_config(&config).unwrap();
        let names: Vec<&str> = svc.sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["bybit", "binance_spot"]);
    }

    #[test]
    fn test_from_config_requires_enabled_source() {
        let mut config = ProvidersConfig::default();
        for p in &mut config.sources {
            p.enabled = false;
        }
        assert!(matches!(
            DataService::from_config(&config),
            Err(EngineError::Config(_))
        ));
    }
}
