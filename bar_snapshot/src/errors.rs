use thiserror::Error;

use crate::{
    config::ConfigError,
    normalizer::NormalizeError,
    providers::{ProviderError, StreamError},
};

/// The unified error type for the `bar_snapshot` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Listener configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A vendor record could not be normalized (data-integrity error).
    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    /// The streaming connection failed or refused a request.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// The historical connection failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A control event could not be decoded.
    #[error("Invalid control event: {0}")]
    ControlEvent(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
