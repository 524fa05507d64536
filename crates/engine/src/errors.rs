use thiserror::Error;

/// Typed error hierarchy for the signal engine.
///
/// Library stages return these variants; the engine boundary converts every
/// one of them into a well-formed [`crate::types::SignalResult`] so nothing
/// propagates to callers of `analyze`. Application code wraps with
/// `anyhow::Context`.
#[derive(Error, Debug)]
pub enum EngineError {
    // -- Data ---------------------------------------------------------------
    #[error("data source unavailable: {name}")]
    DataUnavailable { name: String },

    #[error("rate limited by {provider} (HTTP {status})")]
    RateLimited { provider: String, status: u16 },

    #[error("No data")]
    NoData,

    // -- Thresholds ---------------------------------------------------------
    #[error("confidence {confidence} below threshold")]
    LowConfidence { confidence: u8 },

    #[error("no directional bias (confidence {confidence})")]
    NoBias { confidence: u8 },

    // -- Computation --------------------------------------------------------
    #[error("analysis error: {0}")]
    Analysis(String),

    // -- Configuration ------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl EngineError {
    /// Whether the failure should trigger the rate-limit cooldown before the
    /// next provider is tried.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
