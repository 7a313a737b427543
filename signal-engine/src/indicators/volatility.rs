//! Rolling volatility of close-to-close returns

use crate::indicators::Indicator;
use crate::Result;
use ta::indicators::StandardDeviation;
use ta::Next;

/// Standard deviation of percentage returns over a window
#[derive(Debug)]
pub struct Volatility {
    inner: StandardDeviation,
    period: usize,
    prev_close: Option<f64>,
    return_count: usize,
    last_value: Option<f64>,
}

impl Volatility {
    pub fn new(period: usize) -> Result<Self> {
        let inner = StandardDeviation::new(period)
            .map_err(|e| anyhow::anyhow!("invalid volatility period {}: {:?}", period, e))?;
        Ok(Self {
            inner,
            period,
            prev_close: None,
            return_count: 0,
            last_value: None,
        })
    }
}

impl Indicator for Volatility {
    fn name(&self) -> &str {
        "Volatility"
    }

    fn update(&mut self, value: f64) {
        if let Some(prev) = self.prev_close.replace(value) {
            if prev != 0.0 {
                let std_dev = self.inner.next((value - prev) / prev);
                self.return_count += 1;
                if self.return_count >= self.period {
                    self.last_value = Some(std_dev);
                }
            }
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.return_count >= self.period
    }
}
