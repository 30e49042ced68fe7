use thiserror::Error;

/// Typed error hierarchy for the signal bot.
///
/// Library-internal errors use specific variants; application code wraps with
/// `anyhow::Context` for propagation. The indicator core never returns these:
/// not-yet-computable values are `None` there.
#[derive(Error, Debug)]
pub enum BotError {
    // -- Data ---------------------------------------------------------------
    #[error("data source unavailable: {name}")]
    DataUnavailable { name: String },

    #[error("invalid market data: {reason}")]
    InvalidData { reason: String },

    #[error("insufficient candles: {have} < {need}")]
    InsufficientCandles { have: usize, need: usize },

    // -- Notification -------------------------------------------------------
    #[error("notification failed: {reason}")]
    NotifyFailed { reason: String },

    // -- Configuration ------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}
