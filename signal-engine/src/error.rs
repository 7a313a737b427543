//! Typed errors for the pipeline

use thiserror::Error;

/// Failures raised by a data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("data provider is not connected")]
    NotConnected,
    #[error("unsupported symbol: {0}")]
    UnsupportedSymbol(String),
    #[error("request for {symbol} timed out after {secs}s")]
    Timeout { symbol: String, secs: u64 },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// Failures while producing a signal for one symbol
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data provider {0} could not connect")]
    ProviderUnavailable(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("feature computation failed: {0}")]
    Features(#[from] anyhow::Error),
}

impl EngineError {
    /// Whether the provider lost its session and needs a reconnect
    pub fn is_disconnected(&self) -> bool {
        matches!(self, EngineError::Provider(ProviderError::NotConnected))
    }
}
