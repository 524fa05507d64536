//! Multi-Timeframe Signal Engine.
//!
//! Signal Flow:
//!   1. Fetch candles for every configured timeframe concurrently
//!   2. Detect structure and patterns, score each timeframe
//!   3. Fuse weighted scores into overall confidence and directional bias
//!   4. Gate on confidence floor and bias threshold
//!   5. Derive entry / stop / target on the primary timeframe
//!   6. Size the position from the configured risk
//!
//! `analyze` never fails: every error path resolves to a `SignalResult`
//! carrying NO_TRADE or NEUTRAL and a reason.

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, RiskConfig, SignalThresholds};
use crate::core::data_service::CandleSource;
use crate::core::scoring::{analyze_timeframe, to_score};
use crate::core::{levels, position_sizing};
use crate::errors::EngineError;
use crate::types::{Direction, SignalResult, TimeframeAnalysis, Trend, ZoneKind};

/// Fraction of a timeframe's weight added to bias when it shows BOS.
const BOS_BIAS_FACTOR: Decimal = dec!(0.5);

// ═══════════════════════════════════════════════════════════════════════════
// Fusion
// ═══════════════════════════════════════════════════════════════════════════

/// One analyzed timeframe with its fusion weight.
#[derive(Debug, Clone)]
pub struct WeightedAnalysis {
    pub analysis: TimeframeAnalysis,
    pub weight: Decimal,
}

/// Output of [`fuse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fusion {
    pub confidence: u8,
    pub bias: Decimal,
    pub direction: Direction,
}

/// Weighted confidence with confluence bonus, and weighted directional bias.
///
/// `direction` is LONG/SHORT only when `|bias|` exceeds the threshold; it
/// does not consider the confidence floor.
pub fn fuse(timeframes: &[WeightedAnalysis], thresholds: &SignalThresholds) -> Fusion {
    let total_weight: Decimal = timeframes.iter().map(|t| t.weight).sum();
    if timeframes.is_empty() || total_weight <= Decimal::ZERO {
        return Fusion {
            confidence: 0,
            bias: Decimal::ZERO,
            direction: Direction::Neutral,
        };
    }

    // Σ strength·w / Σ 100·w × 100 reduces to a weighted mean of strengths.
    let weighted: Decimal = timeframes
        .iter()
        .map(|t| Decimal::from(t.analysis.strength) * t.weight)
        .sum();
    let base = weighted / total_weight;

    let confluent = |trend: Trend, zone: ZoneKind| {
        timeframes
            .iter()
            .filter(|t| t.analysis.trend == trend && t.analysis.has_order_block(zone))
            .count()
    };
    let agreeing = confluent(Trend::Bullish, ZoneKind::Bullish)
        .max(confluent(Trend::Bearish, ZoneKind::Bearish));
    let bonus = (Decimal::from(thresholds.confluence_bonus_per_tf) * Decimal::from(agreeing as u64))
        .min(Decimal::from(thresholds.max_confluence_bonus));

    let confidence = to_score(base + bonus);

    let bias: Decimal = timeframes
        .iter()
        .map(|t| {
            let sign = t.analysis.trend.sign();
            let bos = if t.analysis.structure.break_of_structure {
                BOS_BIAS_FACTOR * t.weight * sign
            } else {
                Decimal::ZERO
            };
            t.weight * sign + bos
        })
        .sum();

    let direction = if bias > thresholds.bias_threshold {
        Direction::Long
    } else if bias < -thresholds.bias_threshold {
        Direction::Short
    } else {
        Direction::Neutral
    };

    Fusion {
        confidence,
        bias,
        direction,
    }
}

/// First timeframe (in configured order) whose quick confidence exceeds
/// `primary_confidence`, else the first available.
pub fn select_primary<'a>(
    timeframes: &'a [WeightedAnalysis],
    thresholds: &SignalThresholds,
) -> Option<&'a TimeframeAnalysis> {
    timeframes
        .iter()
        .find(|t| t.analysis.confidence > thresholds.primary_confidence)
        .or_else(|| timeframes.first())
        .map(|t| &t.analysis)
}

// ═══════════════════════════════════════════════════════════════════════════
// MultiTfSignalEngine
// ═══════════════════════════════════════════════════════════════════════════

/// Per-symbol multi-timeframe analysis over a candle source.
///
/// Holds no state between calls; concurrent `analyze` calls are independent.
pub struct MultiTfSignalEngine {
    source: Arc<dyn CandleSource>,
    config: AnalysisConfig,
    risk: RiskConfig,
}

impl MultiTfSignalEngine {
    pub fn new(source: Arc<dyn CandleSource>, config: AnalysisConfig, risk: RiskConfig) -> Self {
        Self {
            source,
            config,
            risk,
        }
    }

    /// Analyze one symbol. Always returns a well-formed result.
    pub async fn analyze(&self, symbol: &str) -> SignalResult {
        match self.evaluate(symbol).await {
            Ok(result) => result,
            Err(e) => {
                warn!(symbol, error = %e, "analysis failed");
                SignalResult::from_error(symbol, &e)
            }
        }
    }

    /// Analyze several symbols concurrently. Results follow input order.
    pub async fn analyze_many(&self, symbols: &[String]) -> Vec<SignalResult> {
        join_all(symbols.iter().map(|s| self.analyze(s))).await
    }

    // -----------------------------------------------------------------------
    // Core evaluation pipeline
    // -----------------------------------------------------------------------

    async fn evaluate(&self, symbol: &str) -> Result<SignalResult, EngineError> {
        let timeframes = self.collect_timeframes(symbol).await;
        if timeframes.is_empty() {
            return Err(EngineError::NoData);
        }

        let thresholds = &self.config.thresholds;
        let fusion = fuse(&timeframes, thresholds);

        debug!(
            symbol,
            timeframes = timeframes.len(),
            confidence = fusion.confidence,
            bias = %fusion.bias,
            direction = fusion.direction.as_str(),
            "fusion complete"
        );

        if fusion.confidence < thresholds.min_confidence {
            let err = EngineError::LowConfidence {
                confidence: fusion.confidence,
            };
            return Ok(rejected(symbol, &err, &fusion, timeframes.len()));
        }
        if fusion.direction == Direction::Neutral {
            let err = EngineError::NoBias {
                confidence: fusion.confidence,
            };
            return Ok(rejected(symbol, &err, &fusion, timeframes.len()));
        }

        let primary = select_primary(&timeframes, thresholds).ok_or(EngineError::NoData)?;
        let trade = levels::calculate_levels(
            fusion.direction,
            primary.price,
            primary,
            &self.config.levels,
        )?;
        let size = position_sizing::size_for(&self.risk, trade.entry, trade.stop_loss);

        info!(
            symbol,
            direction = fusion.direction.as_str(),
            confidence = fusion.confidence,
            primary_tf = %primary.timeframe,
            entry = %trade.entry,
            stop_loss = %trade.stop_loss,
            take_profit = %trade.take_profit,
            risk_reward = %trade.risk_reward,
            size = %size.size,
            "signal emitted"
        );

        Ok(SignalResult {
            symbol: symbol.to_string(),
            direction: fusion.direction,
            confidence: fusion.confidence,
            entry: Some(trade.entry),
            stop_loss: Some(trade.stop_loss),
            take_profit: Some(trade.take_profit),
            risk_reward: Some(trade.risk_reward),
            position_size: Some(size.size),
            max_loss: Some(size.max_loss),
            reason: None,
            bias: Some(fusion.bias),
            timeframes_analyzed: timeframes.len(),
            primary_timeframe: Some(primary.timeframe),
        })
    }

    /// Fetch and analyze every configured timeframe concurrently. Timeframes
    /// whose fetch fails or returns nothing are dropped.
    async fn collect_timeframes(&self, symbol: &str) -> Vec<WeightedAnalysis> {
        let fetches = self.config.timeframes.iter().map(|tw| async move {
            let fetched = self.source.fetch(symbol, tw.timeframe, tw.candles).await;
            (tw, fetched)
        });

        let mut out = Vec::with_capacity(self.config.timeframes.len());
        for (tw, fetched) in join_all(fetches).await {
            match fetched {
                Ok(candles) => match analyze_timeframe(tw.timeframe, &candles, &self.config) {
                    Some(analysis) => out.push(WeightedAnalysis {
                        analysis,
                        weight: tw.weight,
                    }),
                    None => debug!(symbol, timeframe = %tw.timeframe, "no candles available"),
                },
                Err(e) => {
                    warn!(symbol, timeframe = %tw.timeframe, error = %e, "timeframe dropped");
                }
            }
        }
        out
    }
}

/// Threshold rejection that still reports what fusion saw.
fn rejected(symbol: &str, err: &EngineError, fusion: &Fusion, analyzed: usize) -> SignalResult {
    debug!(symbol, reason = %err, "signal rejected");
    let mut result = SignalResult::from_error(symbol, err);
    result.bias = Some(fusion.bias);
    result.timeframes_analyzed = analyzed;
    result
}
