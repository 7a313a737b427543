pub mod config;
pub mod error;
pub mod models;

pub use config::{
    Config, EnsembleConfig, NotifierConfig, OutputConfig, ProviderConfig, ProviderKind, RiskConfig, RiskLevel,
    ServerConfig, StrategyConfig, TradingConfig, MAX_HISTORY_BARS,
};
pub use error::{ConfigError, ModelError};
pub use models::*;
