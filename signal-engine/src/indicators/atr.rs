//! ATR (Average True Range) indicator

use crate::Result;
use shared::Bar;
use ta::indicators::AverageTrueRange;
use ta::{Close, High, Low, Next};

/// Adapter exposing a bar to `ta`'s HLC traits
struct Hlc<'a>(&'a Bar);

impl High for Hlc<'_> {
    fn high(&self) -> f64 {
        self.0.high
    }
}

impl Low for Hlc<'_> {
    fn low(&self) -> f64 {
        self.0.low
    }
}

impl Close for Hlc<'_> {
    fn close(&self) -> f64 {
        self.0.close
    }
}

/// ATR indicator wrapper.
///
/// Unlike the close-only indicators this one consumes whole bars, so it does
/// not implement [`crate::indicators::Indicator`].
#[derive(Debug)]
pub struct ATR {
    inner: AverageTrueRange,
    period: usize,
    update_count: usize,
    last_value: Option<f64>,
}

impl ATR {
    /// Create new ATR indicator
    pub fn new(period: usize) -> Result<Self> {
        let inner = AverageTrueRange::new(period)
            .map_err(|e| anyhow::anyhow!("invalid ATR period {}: {:?}", period, e))?;
        Ok(Self {
            inner,
            period,
            update_count: 0,
            last_value: None,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn update(&mut self, bar: &Bar) {
        let atr_value = self.inner.next(&Hlc(bar));
        self.update_count += 1;
        if self.update_count >= self.period {
            self.last_value = Some(atr_value);
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.last_value
    }

    pub fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }
}
