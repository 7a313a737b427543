//! Market data sources
//!
//! Providers deliver historical OHLC bars; the engine never talks to a
//! broker directly.

pub mod mock;
pub mod provider;
pub mod rest;

pub use mock::*;
pub use provider::*;
pub use rest::*;
