use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
