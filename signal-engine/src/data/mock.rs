//! Mock data provider producing a bounded random walk per symbol

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use shared::{round_price, Bar, Timeframe, MAX_HISTORY_BARS};
use tracing::{debug, info};

use crate::data::DataProvider;
use crate::error::ProviderError;

/// Base price and per-bar volatility of a simulated instrument
#[derive(Debug, Clone, Copy)]
pub struct InstrumentProfile {
    pub base_price: f64,
    pub volatility: f64,
}

/// Fraction of the base price the walk may drift away
const WALK_BAND: f64 = 0.20;

const DEFAULT_INSTRUMENTS: [(&str, f64); 7] = [
    ("EURUSD", 1.0850),
    ("GBPUSD", 1.2650),
    ("USDJPY", 149.50),
    ("AUDUSD", 0.6450),
    ("USDCAD", 1.3650),
    ("NZDUSD", 0.5950),
    ("USDCHF", 0.8850),
];

/// Random-walk bar generator standing in for a broker feed
pub struct MockDataProvider {
    connected: bool,
    rng: StdRng,
    instruments: HashMap<String, InstrumentProfile>,
}

impl MockDataProvider {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible walk for tests and demos
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let instruments = DEFAULT_INSTRUMENTS
            .iter()
            .map(|&(symbol, base_price)| {
                let volatility = if symbol.contains("JPY") { 0.0005 } else { 0.0001 };
                (
                    symbol.to_string(),
                    InstrumentProfile {
                        base_price,
                        volatility,
                    },
                )
            })
            .collect();

        Self {
            connected: false,
            rng,
            instruments,
        }
    }

    /// Register or replace a simulated instrument
    pub fn with_instrument(mut self, symbol: &str, profile: InstrumentProfile) -> Self {
        self.instruments.insert(symbol.to_uppercase(), profile);
        self
    }

    pub fn supported_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.instruments.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    fn generate(
        &mut self,
        symbol: &str,
        profile: InstrumentProfile,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        let vol = profile.volatility;
        if !(vol >= 0.0 && vol.is_finite()) {
            return Err(ProviderError::Provider(format!("{} volatility must be finite and non-negative, got {}", symbol, vol)));
        }
        let step = Normal::new(0.0, vol).map_err(|e| ProviderError::Provider(e.to_string()))?;
        let wick = Normal::new(0.0, vol / 2.0).map_err(|e| ProviderError::Provider(e.to_string()))?;
        let gap = Normal::new(0.0, vol / 4.0).map_err(|e| ProviderError::Provider(e.to_string()))?;

        let floor = profile.base_price * (1.0 - WALK_BAND);
        let ceiling = profile.base_price * (1.0 + WALK_BAND);
        let now = Utc::now();
        let mut price = profile.base_price;
        let mut bars = Vec::with_capacity(count);

        for i in 0..count {
            price = (price * (1.0 + step.sample(&mut self.rng))).clamp(floor, ceiling);

            let open = price * (1.0 + gap.sample(&mut self.rng));
            let close = price;
            let high = (price * (1.0 + wick.sample(&mut self.rng).abs())).max(open).max(close);
            let low = (price * (1.0 - wick.sample(&mut self.rng).abs())).min(open).min(close);
            let volume = self.rng.gen_range(1000..10000) as f64;
            let timestamp = now - timeframe.duration() * (count - i) as i32;

            bars.push(Bar::new(
                timestamp,
                round_price(symbol, open),
                round_price(symbol, high),
                round_price(symbol, low),
                round_price(symbol, close),
                volume,
            ));
        }

        Ok(bars)
    }
}

impl Default for MockDataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataProvider for MockDataProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> bool {
        self.connected = true;
        info!("Mock data provider connected ({} instruments)", self.instruments.len());
        true
    }

    async fn get_historical_data(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        if !self.connected {
            return Err(ProviderError::NotConnected);
        }
        let profile = *self
            .instruments
            .get(symbol)
            .ok_or_else(|| ProviderError::UnsupportedSymbol(symbol.to_string()))?;

        if count > MAX_HISTORY_BARS {
            return Err(ProviderError::Provider(format!(
                "{} bars requested, at most {} are served",
                count, MAX_HISTORY_BARS
            )));
        }

        debug!("Generating {} mock {} bars for {}", count, timeframe, symbol);
        self.generate(symbol, profile, timeframe, count)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        info!("Mock data provider disconnected");
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_connection() {
        let mut provider = MockDataProvider::with_seed(1);
        let err = provider.get_historical_data("EURUSD", Timeframe::H1, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConnected));
    }

    #[tokio::test]
    async fn test_unsupported_symbol() {
        let mut provider = MockDataProvider::with_seed(1);
        assert!(provider.connect().await);
        let err = provider.get_historical_data("BTCUSD", Timeframe::H1, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnsupportedSymbol(ref s) if s == "BTCUSD"));
    }

    #[tokio::test]
    async fn test_bars_are_consistent_and_bounded() {
        let mut provider = MockDataProvider::with_seed(7);
        provider.connect().await;

        for symbol in provider.supported_symbols() {
            let base = provider.instruments[&symbol].base_price;
            let bars = provider.get_historical_data(&symbol, Timeframe::H1, 500).await.unwrap();
            assert_eq!(bars.len(), 500);
            for bar in &bars {
                assert!(bar.is_consistent(), "{} bar out of order: {:?}", symbol, bar);
                assert!(bar.close >= base * 0.79 && bar.close <= base * 1.21);
                assert!((1000.0..10000.0).contains(&bar.volume));
            }
            assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        }
    }

    #[tokio::test]
    async fn test_seed_is_reproducible() {
        let mut a = MockDataProvider::with_seed(99);
        let mut b = MockDataProvider::with_seed(99);
        a.connect().await;
        b.connect().await;
        let bars_a = a.get_historical_data("GBPUSD", Timeframe::M15, 30).await.unwrap();
        let bars_b = b.get_historical_data("GBPUSD", Timeframe::M15, 30).await.unwrap();
        let closes_a: Vec<f64> = bars_a.iter().map(|b| b.close).collect();
        let closes_b: Vec<f64> = bars_b.iter().map(|b| b.close).collect();
        assert_eq!(closes_a, closes_b);
    }

    #[tokio::test]
    async fn test_custom_instrument() {
        let profile = InstrumentProfile {
            base_price: 2000.0,
            volatility: 0.001,
        };
        let mut provider = MockDataProvider::with_seed(5).with_instrument("xauusd", profile);
        provider.connect().await;
        assert!(provider.supported_symbols().contains(&"XAUUSD".to_string()));

        let bars = provider.get_historical_data("XAUUSD", Timeframe::D1, 50).await.unwrap();
        assert_eq!(bars.len(), 50);
        assert!(bars.iter().all(|b| b.close >= 1600.0 && b.close <= 2400.0));
    }

    #[tokio::test]
    async fn test_rejects_bad_volatility_and_oversized_requests() {
        let profile = InstrumentProfile {
            base_price: 1.0,
            volatility: -0.01,
        };
        let mut provider = MockDataProvider::with_seed(5).with_instrument("BADPAIR", profile);
        provider.connect().await;
        let err = provider.get_historical_data("BADPAIR", Timeframe::H1, 10).await.unwrap_err();
        assert!(matches!(err, ProviderError::Provider(_)));

        let err = provider
            .get_historical_data("EURUSD", Timeframe::W1, MAX_HISTORY_BARS + 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Provider(_)));
    }

    #[tokio::test]
    async fn test_short_history_does_not_fail() {
        let mut provider = MockDataProvider::with_seed(3);
        provider.connect().await;
        let bars = provider.get_historical_data("EURUSD", Timeframe::H1, 5).await.unwrap();
        assert_eq!(bars.len(), 5);
    }
}
