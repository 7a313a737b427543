//! Position sizing and portfolio exposure

use serde::{Deserialize, Serialize};
use shared::{RiskConfig, Signal, SignalType};

/// Smallest tradable size
const MIN_UNITS: f64 = 0.01;

/// Suggested size for one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPlan {
    pub symbol: String,
    pub signal_type: SignalType,
    pub units: f64,
    /// Fraction of the balance this trade is allowed to risk
    pub risk_fraction: f64,
    /// Money lost if the stop is hit with `units`
    pub risk_amount: f64,
    pub position_value: f64,
}

/// Sizing across the whole current signal list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioExposure {
    pub account_balance: f64,
    pub positions: Vec<PositionPlan>,
    /// Sum of per-trade risk fractions
    pub total_risk: f64,
    pub max_portfolio_risk: f64,
    pub within_limit: bool,
}

/// Risk-based position sizer
#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: RiskConfig,
}

impl PositionSizer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Scale down risk as more positions are already open
    fn concentration_factor(open_positions: usize) -> f64 {
        match open_positions {
            0 => 1.0,
            1..=3 => 0.8,
            4..=5 => 0.6,
            _ => 0.4,
        }
    }

    /// Risk fraction for a signal given the number of positions already open
    pub fn risk_fraction(&self, signal: &Signal, open_positions: usize) -> f64 {
        self.config.max_risk_per_trade
            * self.config.risk_level.multiplier()
            * signal.confidence
            * Self::concentration_factor(open_positions)
    }

    /// Calculate position size based on risk
    pub fn plan(&self, signal: &Signal, open_positions: usize) -> PositionPlan {
        let balance = self.config.account_balance;
        let risk_fraction = self.risk_fraction(signal, open_positions);
        let stop_distance = signal.risk_distance();

        let max_units = if signal.entry_price > 0.0 {
            (balance * self.config.max_position_fraction / signal.entry_price).max(MIN_UNITS)
        } else {
            MIN_UNITS
        };
        let raw_units = if stop_distance > 0.0 {
            balance * risk_fraction / stop_distance
        } else {
            MIN_UNITS
        };
        let units = (raw_units.max(MIN_UNITS).min(max_units) * 100.0).round() / 100.0;

        PositionPlan {
            symbol: signal.symbol.clone(),
            signal_type: signal.signal_type,
            units,
            risk_fraction,
            risk_amount: units * stop_distance,
            position_value: units * signal.entry_price,
        }
    }

    /// Size every signal in order, each one counting the earlier ones as open
    pub fn exposure(&self, signals: &[Signal]) -> PortfolioExposure {
        let positions: Vec<PositionPlan> = signals
            .iter()
            .enumerate()
            .map(|(open, signal)| self.plan(signal, open))
            .collect();
        let total_risk: f64 = positions.iter().map(|p| p.risk_fraction).sum();

        PortfolioExposure {
            account_balance: self.config.account_balance,
            positions,
            total_risk,
            max_portfolio_risk: self.config.max_portfolio_risk,
            within_limit: total_risk <= self.config.max_portfolio_risk,
        }
    }
}
