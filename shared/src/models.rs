use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Chart timeframe of a bar series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        }
    }

    /// Length of one bar
    pub fn duration(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M30 => Duration::minutes(30),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
            Timeframe::W1 => Duration::weeks(1),
        }
    }

    /// Vote weight in multi-timeframe consensus; longer bars count more
    pub fn consensus_weight(&self) -> f64 {
        match self {
            Timeframe::M1 => 0.1,
            Timeframe::M5 => 0.15,
            Timeframe::M15 => 0.2,
            Timeframe::M30 => 0.25,
            Timeframe::H1 => 0.3,
            Timeframe::H4 => 0.4,
            Timeframe::D1 => 0.5,
            Timeframe::W1 => 0.6,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::H1
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M1" => Ok(Timeframe::M1),
            "M5" => Ok(Timeframe::M5),
            "M15" => Ok(Timeframe::M15),
            "M30" => Ok(Timeframe::M30),
            "H1" => Ok(Timeframe::H1),
            "H4" => Ok(Timeframe::H4),
            "D1" => Ok(Timeframe::D1),
            "W1" => Ok(Timeframe::W1),
            other => Err(ModelError::UnknownTimeframe(other.to_string())),
        }
    }
}

/// One OHLCV sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// `low <= open, close <= high`
    pub fn is_consistent(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Direction of a trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
            SignalType::Hold => "HOLD",
        }
    }

    /// +1 for BUY, -1 for SELL, 0 for HOLD
    pub fn direction(&self) -> i8 {
        match self {
            SignalType::Buy => 1,
            SignalType::Sell => -1,
            SignalType::Hold => 0,
        }
    }

    pub fn from_direction(direction: i8) -> Self {
        match direction.signum() {
            1 => SignalType::Buy,
            -1 => SignalType::Sell,
            _ => SignalType::Hold,
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading signal with risk levels attached.
///
/// Signals are never mutated after creation; a newer signal for the same
/// symbol replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub signal_type: SignalType,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Confidence level (0.0 to 1.0)
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub timeframe: Timeframe,
    pub risk_reward_ratio: f64,
}

impl Signal {
    /// Distance between entry and stop loss
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    /// Whether stop loss and take profit sit on the correct sides of entry
    pub fn levels_straddle_entry(&self) -> bool {
        match self.signal_type {
            SignalType::Buy => self.stop_loss < self.entry_price && self.entry_price < self.take_profit,
            SignalType::Sell => self.take_profit < self.entry_price && self.entry_price < self.stop_loss,
            SignalType::Hold => false,
        }
    }
}

/// Number of decimals a symbol is quoted with
pub fn price_digits(symbol: &str) -> u32 {
    let symbol = symbol.to_uppercase();
    if symbol.contains("JPY") {
        3
    } else if symbol.contains("XAU") {
        2
    } else {
        5
    }
}

/// Smallest price increment for a symbol
pub fn price_point(symbol: &str) -> f64 {
    10f64.powi(-(price_digits(symbol) as i32))
}

/// Round a price to the symbol's quote precision
pub fn round_price(symbol: &str, price: f64) -> f64 {
    let factor = 10f64.powi(price_digits(symbol) as i32);
    (price * factor).round() / factor
}
