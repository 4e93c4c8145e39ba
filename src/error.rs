//! Error types for Fitroom.
//!
//! A single `FitroomError` enum covers every failure surface; module code
//! propagates with `?` and the channel layer decides what the user sees.
//!
//! Quota denial is deliberately NOT an error variant — running out of daily
//! allowance is a normal outcome (`orchestrator::Outcome::Denied`), not a
//! failure.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FitroomError>;

#[derive(Error, Debug)]
pub enum FitroomError {
    /// Missing or malformed configuration at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Product catalog could not be loaded or a selection does not exist.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Quota counter store operation failed after startup.
    ///
    /// Startup connectivity failures never produce this — they trigger the
    /// permanent in-process fallback instead (see [`crate::quota::store`]).
    #[error("quota store error: {0}")]
    Store(#[from] redis::RedisError),

    /// The image generation call failed or returned no image payload.
    #[error("image generation failed: {0}")]
    Generation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Telegram download error: {0}")]
    Download(#[from] teloxide::errors::DownloadError),
}
