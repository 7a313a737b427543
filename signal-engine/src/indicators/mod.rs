//! Technical indicators module
//!
//! Provides technical analysis indicators using the `ta` crate.

pub mod atr;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volatility;

pub use atr::*;
pub use macd::*;
pub use rsi::*;
pub use sma::*;
pub use volatility::*;

/// Indicator trait for close-driven indicators
pub trait Indicator {
    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new value
    fn update(&mut self, value: f64);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}
