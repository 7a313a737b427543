//! Signal Engine: forex signal pipeline
//!
//! Pulls OHLC bars from a data provider, computes indicators with the
//! [ta](https://github.com/greyblake/ta-rs) crate, decides a direction with a
//! confidence score, attaches ATR-based stop-loss/take-profit levels and
//! persists the current signal list for MetaTrader Expert Advisors.
//!
//! # Features
//!
//! - **Data Providers**: mock random walk and REST candle endpoint
//! - **Technical Indicators**: SMA, RSI, MACD, ATR, volatility
//! - **Decision Logic**: SMA crossover with RSI bands, optional multi-timeframe
//!   confirmation and a validator
//! - **Ensemble**: mock model vote that can veto or reweight a signal
//! - **Outputs**: Excel dashboard, MT4/MT5 CSV, JSON snapshot
//! - **Risk**: position sizing and portfolio exposure
//!
//! # Example
//!
//! ```no_run
//! use signal_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::from_env()?;
//!     let mut engine = SignalEngine::from_config(&config)?;
//!     engine.start().await?;
//!     let report = engine.run_cycle().await;
//!     println!("{} signals", report.generated.len());
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod engine;
pub mod ensemble;
pub mod error;
pub mod features;
pub mod indicators;
pub mod notify;
pub mod output;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::data::*;
    pub use crate::engine::*;
    pub use crate::ensemble::*;
    pub use crate::error::*;
    pub use crate::features::*;
    pub use crate::indicators::*;
    pub use crate::notify::*;
    pub use crate::output::{OutputFormat, OutputReport, OutputWriter, SignalSnapshot};
    pub use crate::risk::*;
    pub use crate::strategy::*;

    pub use shared::{Bar, Config, Signal, SignalType, Timeframe};

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
