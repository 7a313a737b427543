//! Data provider contract

use std::time::Duration;

use async_trait::async_trait;
use shared::{Bar, ProviderConfig, ProviderKind, Timeframe};

use crate::data::{MockDataProvider, RestDataProvider};
use crate::error::ProviderError;
use crate::Result;

/// Source of historical OHLC bars.
///
/// Implementations fail with [`ProviderError::NotConnected`] before
/// `connect` succeeds and with [`ProviderError::UnsupportedSymbol`] for
/// symbols they cannot serve.
#[async_trait]
pub trait DataProvider: Send {
    /// Provider name for logs and status
    fn name(&self) -> &str;

    /// Open the session; returns whether the provider is usable
    async fn connect(&mut self) -> bool;

    /// Fetch the latest `count` bars, oldest first
    async fn get_historical_data(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> std::result::Result<Vec<Bar>, ProviderError>;

    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// Build the provider selected by configuration
pub fn build_provider(config: &ProviderConfig, timeout: Duration) -> Result<Box<dyn DataProvider>> {
    match config.kind {
        ProviderKind::Mock => {
            let provider = match config.mock_seed {
                Some(seed) => MockDataProvider::with_seed(seed),
                None => MockDataProvider::new(),
            };
            Ok(Box::new(provider))
        }
        ProviderKind::Rest => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("rest provider requires a base url"))?;
            let provider = RestDataProvider::new(base_url, config.api_key.clone(), timeout)?;
            Ok(Box::new(provider))
        }
    }
}
