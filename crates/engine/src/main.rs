use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use smc_engine::config;
use smc_engine::core::data_service::DataService;
use smc_engine::core::mtf_signal_engine::MultiTfSignalEngine;
use smc_engine::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("ENGINE_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    let config = config::load_config(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    let symbols = requested_symbols();
    if symbols.is_empty() {
        anyhow::bail!("no symbols given: pass them as arguments or set ENGINE_SYMBOLS");
    }

    info!(
        symbols = symbols.len(),
        timeframes = config.analysis.timeframes.len(),
        providers = config.providers.sources.iter().filter(|p| p.enabled).count(),
        cooldown_ms = config.providers.rate_limit_cooldown_ms,
        "smc engine starting"
    );

    let source = DataService::from_config(&config.providers)
        .context("failed to initialise data providers")?;

    let engine = MultiTfSignalEngine::new(Arc::new(source), config.analysis, config.risk);

    let results = engine.analyze_many(&symbols).await;

    let mut stdout = std::io::stdout().lock();
    for result in &results {
        if result.reason.is_some() {
            warn!(
                symbol = %result.symbol,
                direction = result.direction.as_str(),
                reason = result.reason.as_deref().unwrap_or_default(),
                "no signal"
            );
        }
        serde_json::to_writer(&mut stdout, result).context("failed to write result")?;
        std::io::Write::write_all(&mut stdout, b"\n")?;
    }

    info!("analysis complete");
    Ok(())
}

/// Symbols from the command line, else comma-separated `ENGINE_SYMBOLS`.
fn requested_symbols() -> Vec<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let raw = if args.is_empty() {
        std::env::var("ENGINE_SYMBOLS")
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    } else {
        args
    };

    raw.into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
