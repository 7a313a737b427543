//! Signal engine: the polling loop and the state it owns
//!
//! The engine task is the only owner of the provider, the signal book and
//! the output files. Everyone else reads a [`EngineSnapshot`] from a watch
//! channel and asks for work through [`EngineCommand`]s.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{Bar, Config, Signal, Timeframe};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::data::{build_provider, DataProvider};
use crate::ensemble::{EnsemblePredictor, Predictor};
use crate::error::{EngineError, ProviderError};
use crate::features::{FeatureConfig, FeatureEngine};
use crate::notify::WebhookNotifier;
use crate::output::{OutputReport, OutputWriter};
use crate::strategy::{DecisionConfig, SignalGenerator, SignalValidator, TimeframeConsensus, TimeframeVote};
use crate::Result;

/// Pending on-demand requests before senders wait
pub const COMMAND_BUFFER: usize = 16;

/// Latest signal per symbol; a newer signal replaces the older one
#[derive(Debug, Clone, Default)]
pub struct SignalBook {
    signals: BTreeMap<String, Signal>,
}

impl SignalBook {
    pub fn record(&mut self, signal: Signal) -> Option<Signal> {
        self.signals.insert(signal.symbol.clone(), signal)
    }

    pub fn get(&self, symbol: &str) -> Option<&Signal> {
        self.signals.get(symbol)
    }

    /// All signals ordered by symbol
    pub fn signals(&self) -> Vec<Signal> {
        self.signals.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Read-only view published after every state change
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub signals: Vec<Signal>,
    pub cycles: u64,
    pub last_cycle: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub provider: String,
    pub connected: bool,
    pub running: bool,
}

impl EngineSnapshot {
    pub fn signal(&self, symbol: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.symbol.eq_ignore_ascii_case(symbol))
    }
}

/// Work requested from outside the engine task
#[derive(Debug)]
pub enum EngineCommand {
    /// Generate now for `symbols` (all configured symbols when empty)
    Generate {
        symbols: Vec<String>,
        reply: oneshot::Sender<Vec<Signal>>,
    },
}

/// Cloneable access to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    snapshot: watch::Receiver<EngineSnapshot>,
}

impl EngineHandle {
    pub fn new(commands: mpsc::Sender<EngineCommand>, snapshot: watch::Receiver<EngineSnapshot>) -> Self {
        Self { commands, snapshot }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot.clone()
    }

    /// Force generation and wait for the resulting signals
    pub async fn generate(&self, symbols: Vec<String>) -> Result<Vec<Signal>> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(EngineCommand::Generate { symbols, reply })
            .await
            .map_err(|_| anyhow::anyhow!("signal engine is not running"))?;
        response
            .await
            .map_err(|_| anyhow::anyhow!("signal engine dropped the request"))
    }
}

/// Outcome of one pass over a symbol list
#[derive(Debug, Default)]
pub struct CycleReport {
    pub attempted: usize,
    pub skipped: usize,
    pub generated: Vec<Signal>,
    pub failures: Vec<(String, String)>,
    pub output: Option<OutputReport>,
}

impl CycleReport {
    /// Every attempted symbol failed
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }
}

pub struct SignalEngine {
    symbols: Vec<String>,
    timeframe: Timeframe,
    history_bars: usize,
    poll_interval: Duration,
    error_backoff: Duration,
    request_timeout: Duration,
    ensemble_weight: f64,
    provider: Box<dyn DataProvider>,
    features: FeatureEngine,
    generator: SignalGenerator,
    consensus: Option<TimeframeConsensus>,
    predictor: Option<Box<dyn Predictor>>,
    output: OutputWriter,
    notifier: Option<WebhookNotifier>,
    book: SignalBook,
    last_signal_at: HashMap<String, DateTime<Utc>>,
    cycles: u64,
    last_cycle: Option<DateTime<Utc>>,
    last_error: Option<String>,
    running: bool,
    snapshot_tx: watch::Sender<EngineSnapshot>,
}

impl SignalEngine {
    pub fn new(config: &Config, provider: Box<dyn DataProvider>) -> Result<Self> {
        let trading = &config.trading;
        let predictor: Option<Box<dyn Predictor>> = if config.ensemble.enabled {
            Some(Box::new(EnsemblePredictor::new(&config.ensemble)?))
        } else {
            None
        };

        let snapshot = EngineSnapshot {
            signals: Vec::new(),
            cycles: 0,
            last_cycle: None,
            last_error: None,
            provider: provider.name().to_string(),
            connected: provider.is_connected(),
            running: false,
        };
        let (snapshot_tx, _) = watch::channel(snapshot);

        Ok(Self {
            symbols: trading.symbols.clone(),
            timeframe: trading.primary_timeframe,
            history_bars: trading.history_bars,
            poll_interval: Duration::from_secs(trading.poll_interval_secs),
            error_backoff: Duration::from_secs(trading.error_backoff_secs),
            request_timeout: Duration::from_secs(trading.request_timeout_secs),
            ensemble_weight: config.ensemble.weight,
            provider,
            features: FeatureEngine::new(FeatureConfig::from(config))?,
            generator: SignalGenerator::new(DecisionConfig::from(config)),
            consensus: TimeframeConsensus::from_config(config),
            predictor,
            output: OutputWriter::new(config.output.clone())?,
            notifier: WebhookNotifier::from_config(&config.notifier)?,
            book: SignalBook::default(),
            last_signal_at: HashMap::new(),
            cycles: 0,
            last_cycle: None,
            last_error: None,
            running: false,
            snapshot_tx,
        })
    }

    /// Engine with the provider selected by configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.trading.request_timeout_secs);
        let provider = build_provider(&config.provider, timeout)?;
        Self::new(config, provider)
    }

    /// Replace the ensemble, or disable it with `None`
    pub fn with_predictor(mut self, predictor: Option<Box<dyn Predictor>>) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn book(&self) -> &SignalBook {
        &self.book
    }

    pub fn output(&self) -> &OutputWriter {
        &self.output
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(EngineSnapshot {
            signals: self.book.signals(),
            cycles: self.cycles,
            last_cycle: self.last_cycle,
            last_error: self.last_error.clone(),
            provider: self.provider.name().to_string(),
            connected: self.provider.is_connected(),
            running: self.running,
        });
    }

    /// Connect the provider and write the initial (possibly empty) outputs
    pub async fn start(&mut self) -> std::result::Result<(), EngineError> {
        if !self.provider.connect().await {
            let err = EngineError::ProviderUnavailable(self.provider.name().to_string());
            self.last_error = Some(err.to_string());
            self.publish();
            return Err(err);
        }
        info!(
            "Signal engine started: {} symbols on {} via {}, writing to {}",
            self.symbols.len(),
            self.timeframe,
            self.provider.name(),
            self.output.directory().display()
        );
        self.running = true;
        self.output.write_all(&self.book.signals());
        self.publish();
        Ok(())
    }

    async fn fetch(&mut self, symbol: &str, timeframe: Timeframe) -> std::result::Result<Vec<Bar>, EngineError> {
        let request = self.provider.get_historical_data(symbol, timeframe, self.history_bars);
        let bars = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ProviderError::Timeout {
                symbol: symbol.to_string(),
                secs: self.request_timeout.as_secs(),
            })??;
        Ok(bars)
    }

    /// Decision on a confirmation timeframe; neutral when there is no bias
    fn vote(&self, symbol: &str, timeframe: Timeframe, bars: &[Bar]) -> std::result::Result<TimeframeVote, EngineError> {
        let rows = self.features.compute(bars)?;
        Ok(match self.generator.prepare(symbol, &rows) {
            Some((_, assessment)) => TimeframeVote::new(timeframe, assessment.signal_type, assessment.confidence),
            None => TimeframeVote::neutral(timeframe),
        })
    }

    /// Fetch, compute and decide for one symbol
    pub async fn generate_for_symbol(&mut self, symbol: &str) -> std::result::Result<Option<Signal>, EngineError> {
        let bars = self.fetch(symbol, self.timeframe).await?;

        let rows = self.features.compute(&bars)?;
        let (row, assessment) = match self.generator.prepare(symbol, &rows) {
            Some(prepared) => prepared,
            None => return Ok(None),
        };

        let confidence = match self.predictor.as_mut() {
            Some(predictor) => {
                let prediction = predictor.predict(&rows);
                match prediction.blend(assessment.signal_type, assessment.confidence, self.ensemble_weight) {
                    Some(blended) => blended,
                    None => {
                        debug!(
                            "{}: {} suppressed by {} (direction {})",
                            symbol,
                            assessment.signal_type,
                            predictor.name(),
                            prediction.direction
                        );
                        return Ok(None);
                    }
                }
            }
            None => assessment.confidence,
        };

        // Confirmation can only lower confidence, never raise it
        let confidence = match self.consensus.clone() {
            Some(consensus) => {
                let mut votes = vec![TimeframeVote::new(self.timeframe, assessment.signal_type, confidence)];
                for &timeframe in consensus.timeframes() {
                    let bars = self.fetch(symbol, timeframe).await?;
                    votes.push(self.vote(symbol, timeframe, &bars)?);
                }
                let report = consensus.evaluate(votes);
                if !report.confirms(assessment.signal_type) {
                    debug!(
                        "{}: {} not confirmed across timeframes ({:?}, score {:.2})",
                        symbol, assessment.signal_type, report.verdict, report.score
                    );
                    return Ok(None);
                }
                confidence.min(report.confidence)
            }
            None => confidence,
        };

        let signal = match self
            .generator
            .finalize(symbol, self.timeframe, row, assessment.signal_type, confidence)
        {
            Some(signal) => signal,
            None => return Ok(None),
        };

        if let Err(violation) = SignalValidator::validate(&signal) {
            warn!("Dropping invalid {} signal: {}", symbol, violation);
            return Ok(None);
        }
        Ok(Some(signal))
    }

    fn is_fresh(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let interval = chrono::Duration::from_std(self.poll_interval).unwrap_or_else(|_| chrono::Duration::zero());
        self.last_signal_at
            .get(symbol)
            .map(|at| now - *at < interval)
            .unwrap_or(false)
    }

    async fn process(&mut self, symbols: &[String], respect_cadence: bool) -> CycleReport {
        let mut report = CycleReport::default();
        let mut reconnect = false;

        for symbol in symbols {
            if respect_cadence && self.is_fresh(symbol, Utc::now()) {
                report.skipped += 1;
                continue;
            }
            report.attempted += 1;

            match self.generate_for_symbol(symbol).await {
                Ok(Some(signal)) => {
                    info!(
                        "{} {} @ {:.5} (SL {:.5}, TP {:.5}, confidence {:.3})",
                        signal.symbol,
                        signal.signal_type,
                        signal.entry_price,
                        signal.stop_loss,
                        signal.take_profit,
                        signal.confidence
                    );
                    self.last_signal_at.insert(symbol.clone(), signal.timestamp);
                    self.book.record(signal.clone());
                    report.generated.push(signal);
                }
                Ok(None) => debug!("{}: no signal", symbol),
                Err(e) => {
                    warn!("{}: {}", symbol, e);
                    reconnect |= e.is_disconnected();
                    report.failures.push((symbol.clone(), e.to_string()));
                }
            }
        }

        if !report.generated.is_empty() {
            let output = self.output.write_all(&self.book.signals());
            if let Some((format, reason)) = output.failed.first() {
                self.last_error = Some(format!("{} output: {}", format, reason));
            }
            report.output = Some(output);

            if let Some(notifier) = &self.notifier {
                let delivered = notifier.notify_all(&report.generated).await;
                debug!("{} of {} signals delivered to webhook", delivered, report.generated.len());
            }
        }

        if let Some((symbol, reason)) = report.failures.last() {
            self.last_error = Some(format!("{}: {}", symbol, reason));
        }

        if reconnect {
            warn!("Data provider disconnected, reconnecting");
            if !self.provider.connect().await {
                error!("Reconnect to {} failed", self.provider.name());
            }
        }

        report
    }

    /// One polling pass over every configured symbol
    pub async fn run_cycle(&mut self) -> CycleReport {
        let symbols = self.symbols.clone();
        let report = self.process(&symbols, true).await;

        self.cycles += 1;
        self.last_cycle = Some(Utc::now());
        if report.failures.is_empty() && report.output.as_ref().map_or(true, OutputReport::is_complete) {
            self.last_error = None;
        }
        info!(
            "Cycle {}: {} attempted, {} skipped, {} signals, {} failures",
            self.cycles,
            report.attempted,
            report.skipped,
            report.generated.len(),
            report.failures.len()
        );
        self.publish();
        report
    }

    /// Generate now for `symbols`, ignoring cadence
    pub async fn force_generation(&mut self, symbols: &[String]) -> Vec<Signal> {
        let symbols: Vec<String> = if symbols.is_empty() {
            self.symbols.clone()
        } else {
            symbols.iter().map(|s| s.trim().to_uppercase()).collect()
        };
        info!("Forced generation for {:?}", symbols);
        let report = self.process(&symbols, false).await;
        self.publish();
        report.generated
    }

    async fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Generate { symbols, reply } => {
                let signals = self.force_generation(&symbols).await;
                if reply.send(signals).is_err() {
                    debug!("Generate requester went away before the reply");
                }
            }
        }
    }

    /// Poll until `shutdown` resolves, serving commands between cycles
    pub async fn run<F>(mut self, mut commands: mpsc::Receiver<EngineCommand>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        if !self.provider.is_connected() {
            self.start().await?;
        }
        self.running = true;
        tokio::pin!(shutdown);

        loop {
            let report = self.run_cycle().await;
            let delay = if report.all_failed() {
                warn!("Every symbol failed, backing off for {:?}", self.error_backoff);
                self.error_backoff
            } else {
                self.poll_interval
            };

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        self.stop().await;
                        return Ok(());
                    }
                    _ = &mut sleep => break,
                    Some(command) = commands.recv() => self.handle(command).await,
                }
            }
        }
    }

    pub async fn stop(&mut self) {
        info!("Signal engine stopping");
        self.provider.disconnect().await;
        self.running = false;
        self.publish();
    }

    /// Move the engine onto its own task
    pub fn spawn<F>(self, shutdown: F) -> (EngineHandle, JoinHandle<Result<()>>)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        let handle = EngineHandle::new(commands, self.subscribe());
        let task = tokio::spawn(self.run(receiver, shutdown));
        (handle, task)
    }
}
