//! HTTP data provider backed by a JSON candle endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{Bar, Timeframe};
use tracing::{debug, info, warn};

use crate::data::DataProvider;
use crate::error::ProviderError;
use crate::Result;

/// Fetches bars from `GET {base}/candles?symbol=&timeframe=&count=`.
///
/// The endpoint returns a JSON array of bars, oldest first. A 404 means the
/// symbol is not served.
pub struct RestDataProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    connected: bool,
}

impl RestDataProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            connected: false,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl DataProvider for RestDataProvider {
    fn name(&self) -> &str {
        "rest"
    }

    async fn connect(&mut self) -> bool {
        match self.get("/health").send().await {
            Ok(response) if response.status().is_success() => {
                info!("Connected to data provider at {}", self.base_url);
                self.connected = true;
            }
            Ok(response) => {
                warn!("Data provider health check returned {}", response.status());
                self.connected = false;
            }
            Err(e) => {
                warn!("Data provider health check failed: {}", e);
                self.connected = false;
            }
        }
        self.connected
    }

    async fn get_historical_data(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> std::result::Result<Vec<Bar>, ProviderError> {
        if !self.connected {
            return Err(ProviderError::NotConnected);
        }

        debug!("Requesting {} {} bars for {}", count, timeframe, symbol);
        let count = count.to_string();
        let response = self
            .get("/candles")
            .query(&[("symbol", symbol), ("timeframe", timeframe.as_str()), ("count", count.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ProviderError::UnsupportedSymbol(symbol.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                self.connected = false;
                return Err(ProviderError::NotConnected);
            }
            status if !status.is_success() => {
                return Err(ProviderError::Provider(format!("{} returned {}", symbol, status)));
            }
            _ => {}
        }

        let mut bars: Vec<Bar> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        bars.sort_by_key(|bar| bar.timestamp);
        Ok(bars)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
