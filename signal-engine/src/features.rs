//! Feature engine: turns a bar series into indicator rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{Bar, Config};

use crate::indicators::{Indicator, Volatility, ATR, MACD, RSI, SMA};
use crate::Result;

/// Indicator periods used by [`FeatureEngine`]
#[derive(Debug, Clone)]
pub struct FeatureConfig {
    pub sma_short_period: usize,
    pub sma_long_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub volatility_period: usize,
    pub volume_period: usize,
    /// ATR reported until the real ATR is ready
    pub default_atr: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sma_short_period: 5,
            sma_long_period: 20,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            volatility_period: 10,
            volume_period: 10,
            default_atr: 0.001,
        }
    }
}

impl From<&Config> for FeatureConfig {
    fn from(config: &Config) -> Self {
        Self {
            sma_short_period: config.strategy.sma_short_period,
            sma_long_period: config.strategy.sma_long_period,
            rsi_period: config.strategy.rsi_period,
            default_atr: config.risk.default_atr,
            ..Self::default()
        }
    }
}

/// Indicator values at one bar.
///
/// Values that are not ready yet hold their neutral default, and `warm`
/// tells whether the decision inputs are real.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub atr: f64,
    pub volatility: f64,
    pub volume_ratio: f64,
    pub warm: bool,
}

/// Stateless wrapper that builds fresh indicators for each series
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    config: FeatureConfig,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        // Fail on bad periods at construction rather than per cycle
        SMA::new(config.sma_short_period)?;
        SMA::new(config.sma_long_period)?;
        RSI::new(config.rsi_period)?;
        MACD::new(config.macd_fast, config.macd_slow, config.macd_signal)?;
        ATR::new(config.atr_period)?;
        Volatility::new(config.volatility_period)?;
        SMA::new(config.volume_period)?;
        Ok(Self { config })
    }

    /// One row per bar, in input order
    pub fn compute(&self, bars: &[Bar]) -> Result<Vec<FeatureRow>> {
        let cfg = &self.config;
        let mut sma_short = SMA::new(cfg.sma_short_period)?;
        let mut sma_long = SMA::new(cfg.sma_long_period)?;
        let mut rsi = RSI::new(cfg.rsi_period)?;
        let mut macd = MACD::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal)?;
        let mut atr = ATR::new(cfg.atr_period)?;
        let mut volatility = Volatility::new(cfg.volatility_period)?;
        let mut volume_sma = SMA::new(cfg.volume_period)?;

        let mut rows = Vec::with_capacity(bars.len());
        for bar in bars {
            sma_short.update(bar.close);
            sma_long.update(bar.close);
            rsi.update(bar.close);
            macd.update(bar.close);
            atr.update(bar);
            volatility.update(bar.close);
            volume_sma.update(bar.volume);

            let volume_ratio = match volume_sma.value() {
                Some(avg) if avg > 0.0 => bar.volume / avg,
                _ => 1.0,
            };

            rows.push(FeatureRow {
                timestamp: bar.timestamp,
                close: bar.close,
                sma_short: sma_short.value().unwrap_or(bar.close),
                sma_long: sma_long.value().unwrap_or(bar.close),
                rsi: rsi.value_or_neutral(),
                macd: macd.macd().unwrap_or(0.0),
                macd_signal: macd.signal().unwrap_or(0.0),
                macd_histogram: macd.histogram().unwrap_or(0.0),
                atr: atr.value().filter(|v| *v > 0.0).unwrap_or(cfg.default_atr),
                volatility: volatility.value().unwrap_or(0.0),
                volume_ratio,
                warm: sma_short.is_ready() && sma_long.is_ready() && rsi.is_ready(),
            });
        }

        Ok(rows)
    }
}
