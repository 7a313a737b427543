//! Mock model ensemble
//!
//! Five toy heuristics with Gaussian noise. The ensemble only nudges the
//! decision logic: it can veto a signal or shift its confidence, never
//! create one.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use shared::{EnsembleConfig, SignalType};

use crate::features::FeatureRow;
use crate::Result;

/// Floor and ceiling of any noisy model confidence
const CONFIDENCE_FLOOR: f64 = 0.1;
const CONFIDENCE_CEILING: f64 = 0.95;

/// Relative move over the lookback at which a model is fully convinced
const SATURATING_MOVE: f64 = 0.001;

/// Output of one sub-model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub model: String,
    pub direction: i8,
    pub confidence: f64,
}

/// Combined view of the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// -1, 0 or 1
    pub direction: i8,
    pub confidence: f64,
    pub breakdown: Vec<ModelPrediction>,
}

impl Prediction {
    pub fn neutral() -> Self {
        Self {
            direction: 0,
            confidence: 0.0,
            breakdown: Vec::new(),
        }
    }

    /// Combine with a heuristic decision.
    ///
    /// Returns `None` when the prediction opposes `signal_type`, the blended
    /// confidence when it agrees, and `heuristic` unchanged when neutral.
    pub fn blend(&self, signal_type: SignalType, heuristic: f64, weight: f64) -> Option<f64> {
        let bias = signal_type.direction();
        if self.direction == 0 || bias == 0 {
            Some(heuristic)
        } else if self.direction == bias {
            Some(((1.0 - weight) * heuristic + weight * self.confidence).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}

/// Anything that can score the latest feature rows
pub trait Predictor: Send {
    fn name(&self) -> &str;

    fn predict(&mut self, rows: &[FeatureRow]) -> Prediction;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Trend,
    Momentum,
    Volatility,
    Sentiment,
    Volume,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        ModelKind::Trend,
        ModelKind::Momentum,
        ModelKind::Volatility,
        ModelKind::Sentiment,
        ModelKind::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Trend => "trend",
            ModelKind::Momentum => "momentum",
            ModelKind::Volatility => "volatility",
            ModelKind::Sentiment => "sentiment",
            ModelKind::Volume => "volume",
        }
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// One toy sub-model looking at the last `lookback` rows
#[derive(Debug, Clone)]
pub struct MockModel {
    kind: ModelKind,
    lookback: usize,
}

impl MockModel {
    pub fn new(kind: ModelKind, lookback: usize) -> Self {
        Self {
            kind,
            lookback: lookback.max(2),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Direction and strength in [0, 1] before noise
    fn score(&self, window: &[FeatureRow]) -> (i8, f64) {
        let (first, last) = match (window.first(), window.last()) {
            (Some(first), Some(last)) if first.close > 0.0 => (first, last),
            _ => return (0, 0.0),
        };
        let change = last.close - first.close;
        let trend = (change / first.close).abs() / SATURATING_MOVE;

        let (direction, strength) = match self.kind {
            ModelKind::Trend => (sign(change), trend),
            ModelKind::Momentum => {
                let hist = last.macd_histogram;
                if hist == 0.0 {
                    (sign(change), trend)
                } else {
                    (sign(hist), (hist / last.close).abs() / (SATURATING_MOVE / 2.0))
                }
            }
            ModelKind::Volatility => {
                // Calm markets make the trend read more trustworthy
                let damping = 1.0 / (1.0 + last.volatility * 1000.0);
                (sign(change), trend * damping)
            }
            ModelKind::Sentiment => (sign(last.rsi - 50.0), (last.rsi - 50.0).abs() / 50.0),
            ModelKind::Volume => (sign(change), trend * last.volume_ratio.min(2.0) / 2.0),
        };
        (direction, strength.min(1.0))
    }

    pub fn predict(&self, rows: &[FeatureRow], noise: &Normal<f64>, rng: &mut StdRng) -> ModelPrediction {
        if rows.len() < 2 {
            return ModelPrediction {
                model: self.kind.as_str().to_string(),
                direction: 0,
                confidence: 0.0,
            };
        }
        let window = &rows[rows.len().saturating_sub(self.lookback)..];
        let (direction, strength) = self.score(window);
        let base = 0.5 + 0.4 * strength;
        let confidence = (base + noise.sample(rng)).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

        ModelPrediction {
            model: self.kind.as_str().to_string(),
            direction,
            confidence,
        }
    }
}

/// Confidence-weighted vote over the five mock models
pub struct EnsemblePredictor {
    models: Vec<MockModel>,
    noise: Normal<f64>,
    rng: StdRng,
}

impl EnsemblePredictor {
    pub fn new(config: &EnsembleConfig) -> Result<Self> {
        if !(config.noise_std >= 0.0 && config.noise_std.is_finite()) {
            anyhow::bail!("ensemble noise must be a finite non-negative number, got {}", config.noise_std);
        }
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| anyhow::anyhow!("invalid ensemble noise {}: {}", config.noise_std, e))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let models = ModelKind::ALL
            .iter()
            .map(|&kind| MockModel::new(kind, config.lookback))
            .collect();

        Ok(Self { models, noise, rng })
    }

    pub fn models(&self) -> &[MockModel] {
        &self.models
    }
}

impl Predictor for EnsemblePredictor {
    fn name(&self) -> &str {
        "mock-ensemble"
    }

    fn predict(&mut self, rows: &[FeatureRow]) -> Prediction {
        if rows.len() < 2 {
            return Prediction::neutral();
        }

        let breakdown: Vec<ModelPrediction> = self
            .models
            .iter()
            .map(|model| model.predict(rows, &self.noise, &mut self.rng))
            .collect();

        let vote: f64 = breakdown
            .iter()
            .map(|p| f64::from(p.direction) * p.confidence)
            .sum();
        let mean = breakdown.iter().map(|p| p.confidence).sum::<f64>() / breakdown.len() as f64;
        let confidence = (mean + self.noise.sample(&mut self.rng)).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

        Prediction {
            direction: sign(vote),
            confidence,
            breakdown,
        }
    }
}
