//! Signal validation

use shared::{Signal, SignalType};
use thiserror::Error;

/// Reason a signal was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalViolation {
    #[error("HOLD signals are never emitted")]
    Hold,
    #[error("signal has no symbol")]
    EmptySymbol,
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("non-finite or non-positive price")]
    InvalidPrice,
    #[error("stop loss and take profit are on the wrong side of entry")]
    LevelsMisplaced,
}

/// Signal validator
pub struct SignalValidator;

impl SignalValidator {
    /// Validate signal
    pub fn validate(signal: &Signal) -> Result<(), SignalViolation> {
        if signal.signal_type == SignalType::Hold {
            return Err(SignalViolation::Hold);
        }
        if signal.symbol.trim().is_empty() {
            return Err(SignalViolation::EmptySymbol);
        }
        if !(0.0..=1.0).contains(&signal.confidence) {
            return Err(SignalViolation::ConfidenceOutOfRange(signal.confidence));
        }
        let prices = [signal.entry_price, signal.stop_loss, signal.take_profit];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SignalViolation::InvalidPrice);
        }
        if !signal.levels_straddle_entry() {
            return Err(SignalViolation::LevelsMisplaced);
        }
        Ok(())
    }

    /// Check if signal is actionable
    pub fn is_actionable(signal: &Signal, min_confidence: f64) -> bool {
        Self::validate(signal).is_ok() && signal.confidence >= min_confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::Timeframe;

    fn buy() -> Signal {
        Signal {
            symbol: "EURUSD".to_string(),
            signal_type: SignalType::Buy,
            entry_price: 1.1,
            stop_loss: 1.098,
            take_profit: 1.104,
            confidence: 0.8,
            timestamp: Utc::now(),
            timeframe: Timeframe::H1,
            risk_reward_ratio: 2.0,
        }
    }

    #[test]
    fn test_valid_signal() {
        assert!(SignalValidator::validate(&buy()).is_ok());
        assert!(SignalValidator::is_actionable(&buy(), 0.7));
        assert!(!SignalValidator::is_actionable(&buy(), 0.9));
    }

    #[test]
    fn test_violations() {
        let mut s = buy();
        s.signal_type = SignalType::Hold;
        assert_eq!(SignalValidator::validate(&s), Err(SignalViolation::Hold));

        let mut s = buy();
        s.confidence = 1.2;
        assert_eq!(SignalValidator::validate(&s), Err(SignalViolation::ConfidenceOutOfRange(1.2)));

        let mut s = buy();
        s.take_profit = f64::NAN;
        assert_eq!(SignalValidator::validate(&s), Err(SignalViolation::InvalidPrice));

        let mut s = buy();
        s.signal_type = SignalType::Sell;
        assert_eq!(SignalValidator::validate(&s), Err(SignalViolation::LevelsMisplaced));
    }
}
