//! RSI (Relative Strength Index) indicator

use crate::indicators::Indicator;
use crate::Result;
use ta::indicators::RelativeStrengthIndex;
use ta::Next;

/// RSI value used while the indicator is still warming up
pub const NEUTRAL_RSI: f64 = 50.0;

/// RSI indicator wrapper
#[derive(Debug)]
pub struct RSI {
    inner: RelativeStrengthIndex,
    period: usize,
    update_count: usize,
    last_value: Option<f64>,
}

impl RSI {
    /// Create new RSI indicator
    pub fn new(period: usize) -> Result<Self> {
        let inner = RelativeStrengthIndex::new(period)
            .map_err(|e| anyhow::anyhow!("invalid RSI period {}: {:?}", period, e))?;
        Ok(Self {
            inner,
            period,
            update_count: 0,
            last_value: None,
        })
    }

    /// Get RSI period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Current value, or the neutral 50 before the indicator is ready
    pub fn value_or_neutral(&self) -> f64 {
        self.last_value.unwrap_or(NEUTRAL_RSI)
    }
}

impl Indicator for RSI {
    fn name(&self) -> &str {
        "RSI"
    }

    fn update(&mut self, value: f64) {
        let rsi_value = self.inner.next(value);
        self.update_count += 1;
        if self.update_count > self.period {
            self.last_value = Some(rsi_value);
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        // ta RSI needs period+1 values
        self.update_count > self.period
    }
}

/// Calculate RSI from a series of values
pub fn calculate_rsi(values: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    let mut rsi = RSI::new(period)?;
    Ok(values
        .iter()
        .map(|&value| {
            rsi.update(value);
            rsi.value()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi() {
        let mut rsi = RSI::new(14).unwrap();
        let values = vec![100.0, 102.0, 101.0, 103.0, 105.0, 104.0, 106.0];

        for value in values {
            rsi.update(value);
        }

        // For 14 period, need at least 15 values
        assert!(!rsi.is_ready());
        assert_eq!(rsi.value_or_neutral(), NEUTRAL_RSI);
    }

    #[test]
    fn test_rsi_bounds() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + ((i * 7) % 5) as f64).collect();
        for value in calculate_rsi(&values, 14).unwrap().into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }
}
