//! SMA crossover + RSI band decision logic

use chrono::Utc;
use shared::{price_point, round_price, Config, Signal, SignalType, Timeframe};
use tracing::debug;

use crate::features::FeatureRow;

/// Decision thresholds and level multipliers
#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub min_confidence: f64,
    pub min_bars: usize,
    pub permission_bonus: f64,
    pub trend_saturation_pct: f64,
    pub stop_loss_multiplier: f64,
    pub take_profit_multiplier: f64,
    pub default_atr: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DecisionConfig {
    fn from(config: &Config) -> Self {
        Self {
            rsi_overbought: config.strategy.rsi_overbought,
            rsi_oversold: config.strategy.rsi_oversold,
            min_confidence: config.strategy.min_confidence,
            min_bars: config.strategy.min_bars,
            permission_bonus: config.strategy.permission_bonus,
            trend_saturation_pct: config.strategy.trend_saturation_pct,
            stop_loss_multiplier: config.risk.stop_loss_multiplier,
            take_profit_multiplier: config.risk.take_profit_multiplier,
            default_atr: config.risk.default_atr,
        }
    }
}

/// Directional bias and heuristic confidence for the latest feature row
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub signal_type: SignalType,
    pub confidence: f64,
    pub reason: String,
}

impl Assessment {
    pub fn buy(confidence: f64, reason: String) -> Self {
        Self {
            signal_type: SignalType::Buy,
            confidence,
            reason,
        }
    }

    pub fn sell(confidence: f64, reason: String) -> Self {
        Self {
            signal_type: SignalType::Sell,
            confidence,
            reason,
        }
    }

    pub fn hold(reason: String) -> Self {
        Self {
            signal_type: SignalType::Hold,
            confidence: 0.0,
            reason,
        }
    }
}

/// Turns feature rows into at most one signal per call
#[derive(Debug, Clone)]
pub struct SignalGenerator {
    config: DecisionConfig,
}

impl SignalGenerator {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Trend separation in [0, 1], saturating at `trend_saturation_pct` percent of price
    fn trend_strength(&self, row: &FeatureRow) -> f64 {
        if row.close <= 0.0 {
            return 0.0;
        }
        let separation_pct = (row.sma_short - row.sma_long).abs() / row.close * 100.0;
        (separation_pct / self.config.trend_saturation_pct).min(1.0)
    }

    fn confidence(&self, row: &FeatureRow, signal_type: SignalType) -> f64 {
        let extreme = match signal_type {
            SignalType::Buy => row.rsi < self.config.rsi_oversold,
            SignalType::Sell => row.rsi > self.config.rsi_overbought,
            SignalType::Hold => false,
        };
        let rsi_term = if extreme { 0.25 } else { 0.15 };
        (0.5 + 0.2 * self.trend_strength(row) + rsi_term + self.config.permission_bonus).clamp(0.0, 1.0)
    }

    /// Bias and confidence for one row, ignoring thresholds
    pub fn assess(&self, row: &FeatureRow) -> Assessment {
        let cfg = &self.config;
        if row.sma_short > row.sma_long && row.rsi < cfg.rsi_overbought {
            let confidence = self.confidence(row, SignalType::Buy);
            Assessment::buy(
                confidence,
                format!("SMA {:.5} above {:.5}, RSI {:.1}", row.sma_short, row.sma_long, row.rsi),
            )
        } else if row.sma_short < row.sma_long && row.rsi > cfg.rsi_oversold {
            let confidence = self.confidence(row, SignalType::Sell);
            Assessment::sell(
                confidence,
                format!("SMA {:.5} below {:.5}, RSI {:.1}", row.sma_short, row.sma_long, row.rsi),
            )
        } else {
            Assessment::hold(format!("no bias, RSI {:.1}", row.rsi))
        }
    }

    /// Attach levels to a decided direction.
    ///
    /// Returns `None` for HOLD or when `confidence` is below the minimum.
    pub fn finalize(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        row: &FeatureRow,
        signal_type: SignalType,
        confidence: f64,
    ) -> Option<Signal> {
        let cfg = &self.config;
        if signal_type == SignalType::Hold {
            return None;
        }
        if confidence < cfg.min_confidence {
            debug!(
                "{} {} confidence {:.3} below minimum {:.3}",
                symbol, signal_type, confidence, cfg.min_confidence
            );
            return None;
        }

        let atr = if row.atr > 0.0 { row.atr } else { cfg.default_atr };
        let point = price_point(symbol);
        let direction = f64::from(signal_type.direction());
        let entry = round_price(symbol, row.close);

        let level = |distance: f64, side: f64| {
            let price = round_price(symbol, entry + side * distance.max(point));
            // Rounding must not collapse a level onto the entry
            if (price - entry).abs() < point / 2.0 {
                round_price(symbol, entry + side * point)
            } else {
                price
            }
        };
        let stop_loss = level(atr * cfg.stop_loss_multiplier, -direction);
        let take_profit = level(atr * cfg.take_profit_multiplier, direction);

        let risk = (entry - stop_loss).abs();
        let reward = (take_profit - entry).abs();
        let risk_reward_ratio = if risk > 0.0 {
            (reward / risk * 100.0).round() / 100.0
        } else {
            0.0
        };

        Some(Signal {
            symbol: symbol.to_string(),
            signal_type,
            entry_price: entry,
            stop_loss,
            take_profit,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            timeframe,
            risk_reward_ratio,
        })
    }

    /// Latest row and its directional assessment.
    ///
    /// `None` when history is shorter than `min_bars`, indicators are still
    /// warming up, or there is no bias.
    pub fn prepare<'a>(&self, symbol: &str, rows: &'a [FeatureRow]) -> Option<(&'a FeatureRow, Assessment)> {
        if rows.len() < self.config.min_bars {
            debug!("{}: {} bars, need {}", symbol, rows.len(), self.config.min_bars);
            return None;
        }
        let row = rows.last()?;
        if !row.warm {
            debug!("{}: indicators still warming up", symbol);
            return None;
        }

        let assessment = self.assess(row);
        debug!("{}: {} ({})", symbol, assessment.signal_type, assessment.reason);
        if assessment.signal_type == SignalType::Hold {
            return None;
        }
        Some((row, assessment))
    }

    /// Decide on the latest row of a feature series
    pub fn generate(&self, symbol: &str, timeframe: Timeframe, rows: &[FeatureRow]) -> Option<Signal> {
        let (row, assessment) = self.prepare(symbol, rows)?;
        self.finalize(symbol, timeframe, row, assessment.signal_type, assessment.confidence)
    }
}
