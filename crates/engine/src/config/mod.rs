pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`EngineConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   providers.json
///   analysis.json   (optional, defaults apply)
///   risk.json       (optional, defaults apply)
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                  | Config Field                          |
/// |--------------------------|---------------------------------------|
/// | `RISK_PERCENT`           | `risk.risk_percent`                   |
/// | `ACCOUNT_BALANCE`        | `risk.account_balance`                |
/// | `RATE_LIMIT_COOLDOWN_MS` | `providers.rate_limit_cooldown_ms`    |
/// | `ENGINE_LOG_DIR`         | `app.logging.log_dir`                 |
pub fn load_config(config_dir: &Path) -> Result<EngineConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig = serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let providers: ProvidersConfig =
        serde_json::from_str(&read("providers.json")?).context("parsing providers.json")?;

    // Analysis and risk tables fall back to their defaults when absent.
    let analysis: AnalysisConfig = match read("analysis.json") {
        Ok(contents) => serde_json::from_str(&contents).context("parsing analysis.json")?,
        Err(_) => AnalysisConfig::default(),
    };

    let risk: RiskConfig = match read("risk.json") {
        Ok(contents) => serde_json::from_str(&contents).context("parsing risk.json")?,
        Err(_) => RiskConfig::default(),
    };

    let mut config = EngineConfig {
        app,
        providers,
        analysis,
        risk,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Parse failures are skipped and the
/// JSON value remains.
fn apply_env_overrides(config: &mut EngineConfig) {
    if let Some(val) = env_decimal("RISK_PERCENT") {
        info!(%val, "env override: RISK_PERCENT");
        config.risk.risk_percent = val;
    }

    if let Some(val) = env_decimal("ACCOUNT_BALANCE") {
        info!(%val, "env override: ACCOUNT_BALANCE");
        config.risk.account_balance = val;
    }

    if let Some(val) = env_parse::<u64>("RATE_LIMIT_COOLDOWN_MS") {
        info!(val, "env override: RATE_LIMIT_COOLDOWN_MS");
        config.providers.rate_limit_cooldown_ms = val;
    }

    if let Some(val) = env_string("ENGINE_LOG_DIR") {
        info!("env override: ENGINE_LOG_DIR");
        config.app.logging.log_dir = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}
