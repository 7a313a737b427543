//! Multi-timeframe confirmation of a primary-timeframe decision
//!
//! Each timeframe casts a vote (direction and confidence) weighted by
//! [`Timeframe::consensus_weight`]. A signal survives only when the weighted
//! score points its way by more than `min_consensus`.

use shared::{Config, SignalType, Timeframe};

/// Score magnitude for a strong verdict
const STRONG_CONSENSUS: f64 = 0.7;
/// Share of timeframes voting the same direction for a strong verdict
const STRONG_AGREEMENT: f64 = 0.7;

const CONFIDENCE_FLOOR: f64 = 0.1;
const CONFIDENCE_CEILING: f64 = 0.95;

/// Decision of the strategy on one timeframe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeVote {
    pub timeframe: Timeframe,
    pub signal_type: SignalType,
    pub confidence: f64,
}

impl TimeframeVote {
    pub fn new(timeframe: Timeframe, signal_type: SignalType, confidence: f64) -> Self {
        Self {
            timeframe,
            signal_type,
            confidence,
        }
    }

    /// No bias, e.g. indicators still warming up
    pub fn neutral(timeframe: Timeframe) -> Self {
        Self::new(timeframe, SignalType::Hold, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl Verdict {
    pub fn direction(&self) -> i8 {
        match self {
            Verdict::StrongBuy | Verdict::Buy => 1,
            Verdict::Neutral => 0,
            Verdict::Sell | Verdict::StrongSell => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusReport {
    pub verdict: Verdict,
    /// Weighted score in [-1, 1], positive for BUY
    pub score: f64,
    pub confidence: f64,
    pub votes: Vec<TimeframeVote>,
}

impl ConsensusReport {
    /// Whether the verdict points the same way as `signal_type`
    pub fn confirms(&self, signal_type: SignalType) -> bool {
        signal_type != SignalType::Hold && self.verdict.direction() == signal_type.direction()
    }
}

/// Weighted vote across the primary and confirmation timeframes
#[derive(Debug, Clone)]
pub struct TimeframeConsensus {
    timeframes: Vec<Timeframe>,
    min_consensus: f64,
}

impl TimeframeConsensus {
    pub fn new(timeframes: Vec<Timeframe>, min_consensus: f64) -> Self {
        Self {
            timeframes,
            min_consensus,
        }
    }

    /// `None` when no confirmation timeframe differs from the primary one
    pub fn from_config(config: &Config) -> Option<Self> {
        let primary = config.trading.primary_timeframe;
        let mut timeframes: Vec<Timeframe> = Vec::new();
        for &timeframe in &config.trading.confirm_timeframes {
            if timeframe != primary && !timeframes.contains(&timeframe) {
                timeframes.push(timeframe);
            }
        }
        if timeframes.is_empty() {
            None
        } else {
            Some(Self::new(timeframes, config.strategy.min_consensus))
        }
    }

    /// Confirmation timeframes, primary excluded
    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    pub fn evaluate(&self, votes: Vec<TimeframeVote>) -> ConsensusReport {
        if votes.is_empty() {
            return ConsensusReport {
                verdict: Verdict::Neutral,
                score: 0.0,
                confidence: 0.0,
                votes,
            };
        }

        let total_weight: f64 = votes.iter().map(|v| v.timeframe.consensus_weight()).sum();
        let weighted: f64 = votes
            .iter()
            .map(|v| v.timeframe.consensus_weight() * f64::from(v.signal_type.direction()) * v.confidence)
            .sum();
        let score = (weighted / total_weight.max(0.01)).clamp(-1.0, 1.0);

        let count = |signal_type: SignalType| votes.iter().filter(|v| v.signal_type == signal_type).count();
        let (buys, sells, holds) = (count(SignalType::Buy), count(SignalType::Sell), count(SignalType::Hold));
        let n = votes.len() as f64;

        let verdict = if score > STRONG_CONSENSUS && buys as f64 >= n * STRONG_AGREEMENT {
            Verdict::StrongBuy
        } else if score > self.min_consensus {
            Verdict::Buy
        } else if score < -STRONG_CONSENSUS && sells as f64 >= n * STRONG_AGREEMENT {
            Verdict::StrongSell
        } else if score < -self.min_consensus {
            Verdict::Sell
        } else {
            Verdict::Neutral
        };

        let average = votes.iter().map(|v| v.confidence).sum::<f64>() / n;
        let agreement = buys.max(sells).max(holds) as f64 / n;
        let confidence =
            (0.4 * average + 0.4 * score.abs() + 0.2 * agreement).clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

        ConsensusReport {
            verdict,
            score,
            confidence,
            votes,
        }
    }
}
