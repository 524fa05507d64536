use std::collections::HashSet;

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::EngineConfig;

/// Validate invariants across the merged config that serde alone cannot enforce.
///
/// Every violation is collected so a broken config reports all of its
/// problems at once. Called automatically by [`super::load_config`].
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_providers_config(config, &mut errors);
    validate_analysis_config(config, &mut errors);
    validate_risk_config(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

fn validate_providers_config(config: &EngineConfig, errors: &mut Vec<String>) {
    let providers = &config.providers;

    if !providers.sources.iter().any(|p| p.enabled) {
        errors.push("providers: at least one enabled source is required".into());
    }

    for p in &providers.sources {
        if p.base_url.is_empty() {
            errors.push(format!("providers.{}: base_url is empty", p.name));
        }
        if p.timeout_seconds == 0 {
            errors.push(format!("providers.{}: timeout_seconds must be > 0", p.name));
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

fn validate_analysis_config(config: &EngineConfig, errors: &mut Vec<String>) {
    let analysis = &config.analysis;

    if analysis.timeframes.is_empty() {
        errors.push("analysis: at least one timeframe is required".into());
    }

    let mut seen = HashSet::new();
    for tw in &analysis.timeframes {
        if !seen.insert(tw.timeframe) {
            errors.push(format!("analysis.timeframes: {} listed twice", tw.timeframe));
        }
        if tw.weight <= Decimal::ZERO {
            errors.push(format!(
                "analysis.timeframes: weight for {} ({}) must be > 0",
                tw.timeframe, tw.weight
            ));
        }
        if tw.candles == 0 {
            errors.push(format!("analysis.timeframes: candles for {} must be > 0", tw.timeframe));
        }
    }

    if analysis.structure.swing_lookback == 0 {
        errors.push("analysis.structure: swing_lookback must be > 0".into());
    }
    if analysis.structure.atr_period == 0 {
        errors.push("analysis.structure: atr_period must be > 0".into());
    }

    let pat = &analysis.patterns;
    if pat.proximity_pct <= Decimal::ZERO || pat.proximity_pct >= dec!(1) {
        errors.push(format!(
            "analysis.patterns: proximity_pct ({}) must be in (0, 1)",
            pat.proximity_pct
        ));
    }
    if pat.volume_bands == 0 {
        errors.push("analysis.patterns: volume_bands must be > 0".into());
    }
    if pat.liquidity_lookback == 0 {
        errors.push("analysis.patterns: liquidity_lookback must be > 0".into());
    }

    let th = &analysis.thresholds;
    if th.min_confidence > 100 {
        errors.push(format!(
            "analysis.thresholds: min_confidence ({}) must be <= 100",
            th.min_confidence
        ));
    }
    if th.bias_threshold < Decimal::ZERO {
        errors.push(format!(
            "analysis.thresholds: bias_threshold ({}) must be >= 0",
            th.bias_threshold
        ));
    }

    let lv = &analysis.levels;
    if lv.min_risk_reward <= Decimal::ZERO || lv.min_risk_reward > lv.max_risk_reward {
        errors.push(format!(
            "analysis.levels: risk/reward bounds [{}, {}] must satisfy 0 < min <= max",
            lv.min_risk_reward, lv.max_risk_reward
        ));
    }
    for (name, value) in [
        ("default_stop_atr", lv.default_stop_atr),
        ("fallback_stop_atr", lv.fallback_stop_atr),
        ("max_distance_atr", lv.max_distance_atr),
    ] {
        if value <= Decimal::ZERO {
            errors.push(format!("analysis.levels: {name} ({value}) must be > 0"));
        }
    }
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

fn validate_risk_config(config: &EngineConfig, errors: &mut Vec<String>) {
    let risk = &config.risk;

    if risk.risk_percent <= Decimal::ZERO || risk.risk_percent > dec!(100) {
        errors.push(format!(
            "risk: risk_percent ({}) must be in (0, 100]",
            risk.risk_percent
        ));
    }
    if risk.account_balance <= Decimal::ZERO {
        errors.push(format!(
            "risk: account_balance ({}) must be > 0",
            risk.account_balance
        ));
    }
}
