//! Integration tests for signal-engine

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shared::{Bar, Config, Signal, SignalType, Timeframe};
use signal_engine::data::DataProvider;
use signal_engine::engine::SignalEngine;
use signal_engine::ensemble::{Prediction, Predictor};
use signal_engine::error::ProviderError;
use signal_engine::features::FeatureRow;
use signal_engine::output::{load_snapshot, OutputFormat, OutputWriter};

/// Serves fixed bar series; can drop its session once to exercise reconnects
struct StaticProvider {
    series: HashMap<String, Vec<Bar>>,
    /// Served for every symbol on these timeframes instead of `series`
    by_timeframe: HashMap<Timeframe, Vec<Bar>>,
    delay: Option<std::time::Duration>,
    connected: bool,
    drop_session_once: bool,
    connects: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Timeframe>>>,
}

impl StaticProvider {
    fn new(series: HashMap<String, Vec<Bar>>) -> Self {
        Self {
            series,
            by_timeframe: HashMap::new(),
            delay: None,
            connected: false,
            drop_session_once: false,
            connects: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl DataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn connect(&mut self) -> bool {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connected = true;
        true
    }

    async fn get_historical_data(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.requests.lock().unwrap().push(timeframe);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.drop_session_once {
            self.drop_session_once = false;
            self.connected = false;
        }
        if !self.connected {
            return Err(ProviderError::NotConnected);
        }
        let bars = self
            .by_timeframe
            .get(&timeframe)
            .or_else(|| self.series.get(symbol))
            .ok_or_else(|| ProviderError::UnsupportedSymbol(symbol.to_string()))?;
        Ok(bars[bars.len().saturating_sub(count)..].to_vec())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Always predicts a fall with high confidence
struct Bearish;

impl Predictor for Bearish {
    fn name(&self) -> &str {
        "bearish"
    }

    fn predict(&mut self, _rows: &[FeatureRow]) -> Prediction {
        Prediction {
            direction: -1,
            confidence: 0.9,
            breakdown: Vec::new(),
        }
    }
}

/// Half-pip drift per bar with 2-pip pullbacks
fn trending_bars(count: usize, direction: f64) -> Vec<Bar> {
    let start = Utc::now() - Duration::hours(count as i64);
    let mut prev_close: Option<f64> = None;
    (0..count)
        .map(|i| {
            let pips = (i / 2) as f64 + if i % 2 == 1 { 3.0 } else { 0.0 };
            let close = 1.10000 + direction * pips * 0.0001;
            let open = prev_close.unwrap_or(close);
            prev_close = Some(close);
            Bar::new(
                start + Duration::hours(i as i64),
                open,
                open.max(close) + 0.00005,
                open.min(close) - 0.00005,
                close,
                1000.0,
            )
        })
        .collect()
}

fn provider() -> StaticProvider {
    let mut series = HashMap::new();
    series.insert("EURUSD".to_string(), trending_bars(30, 1.0));
    series.insert("GBPUSD".to_string(), trending_bars(30, -1.0));
    StaticProvider::new(series)
}

fn config(dir: &Path, symbols: &[&str]) -> Config {
    let mut config = Config::default();
    config.trading.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.trading.history_bars = 30;
    config.ensemble.enabled = false;
    config.output.directory = dir.to_string_lossy().into_owned();
    config
}

fn signal(symbol: &str, signal_type: SignalType, entry: f64) -> Signal {
    let side = f64::from(signal_type.direction());
    Signal {
        symbol: symbol.to_string(),
        signal_type,
        entry_price: entry,
        stop_loss: entry - side * 0.0015,
        take_profit: entry + side * 0.003,
        confidence: 0.8,
        timestamp: Utc::now(),
        timeframe: Timeframe::H1,
        risk_reward_ratio: 2.0,
    }
}

#[tokio::test]
async fn test_engine_cycle_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["EURUSD", "GBPUSD"]);
    let mut engine = SignalEngine::new(&config, Box::new(provider())).unwrap();
    let snapshots = engine.subscribe();

    engine.start().await.unwrap();
    let report = engine.run_cycle().await;

    assert_eq!(report.attempted, 2);
    assert!(report.failures.is_empty());
    assert_eq!(report.generated.len(), 2);
    assert!(report.output.as_ref().unwrap().is_complete());

    let writer = engine.output();
    for format in OutputFormat::ALL {
        assert!(writer.path_for(format).exists(), "{} missing", format);
    }

    let saved = load_snapshot(writer.path_for(OutputFormat::Json)).unwrap();
    assert_eq!(saved.total_count, 2);
    assert_eq!(saved.signals[0].symbol, "EURUSD");
    assert_eq!(saved.signals[0].signal_type, SignalType::Buy);
    assert_eq!(saved.signals[1].symbol, "GBPUSD");
    assert_eq!(saved.signals[1].signal_type, SignalType::Sell);

    let mt4 = std::fs::read_to_string(writer.path_for(OutputFormat::Mt4Csv)).unwrap();
    assert!(mt4.lines().any(|l| l.starts_with("EURUSD,BUY,")));
    assert!(mt4.lines().any(|l| l.starts_with("GBPUSD,SELL,")));

    let snapshot = snapshots.borrow().clone();
    assert_eq!(snapshot.cycles, 1);
    assert_eq!(snapshot.signals.len(), 2);
    assert!(snapshot.connected);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn test_cadence_skips_recent_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["EURUSD", "GBPUSD"]);
    let mut engine = SignalEngine::new(&config, Box::new(provider())).unwrap();
    engine.start().await.unwrap();

    assert_eq!(engine.run_cycle().await.generated.len(), 2);

    let second = engine.run_cycle().await;
    assert_eq!(second.skipped, 2);
    assert_eq!(second.attempted, 0);
    assert!(second.generated.is_empty());

    // Forced generation ignores cadence
    let forced = engine.force_generation(&["eurusd".to_string()]).await;
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].symbol, "EURUSD");
    assert_eq!(engine.book().len(), 2);
}

#[tokio::test]
async fn test_unsupported_symbol_fails_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["XAUUSD"]);
    let mut engine = SignalEngine::new(&config, Box::new(provider())).unwrap();
    let snapshots = engine.subscribe();
    engine.start().await.unwrap();

    let report = engine.run_cycle().await;
    assert!(report.all_failed());
    assert!(report.output.is_none());
    let last_error = snapshots.borrow().last_error.clone().unwrap();
    assert!(last_error.contains("XAUUSD"));
}

#[tokio::test]
async fn test_engine_reconnects_after_lost_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["EURUSD"]);
    let mut provider = provider();
    provider.drop_session_once = true;
    let connects = provider.connects.clone();

    let mut engine = SignalEngine::new(&config, Box::new(provider)).unwrap();
    engine.start().await.unwrap();

    let first = engine.run_cycle().await;
    assert!(first.all_failed());
    assert_eq!(connects.load(Ordering::SeqCst), 2);

    let second = engine.run_cycle().await;
    assert_eq!(second.generated.len(), 1);
}

#[tokio::test]
async fn test_opposing_prediction_suppresses_signal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["EURUSD", "GBPUSD"]);
    let mut engine = SignalEngine::new(&config, Box::new(provider()))
        .unwrap()
        .with_predictor(Some(Box::new(Bearish)));
    engine.start().await.unwrap();

    let report = engine.run_cycle().await;
    assert_eq!(report.generated.len(), 1);
    let sell = &report.generated[0];
    assert_eq!(sell.symbol, "GBPUSD");
    assert_eq!(sell.signal_type, SignalType::Sell);
    // 0.7 * heuristic + 0.3 * 0.9 stays above the heuristic floor of 0.75
    assert!(sell.confidence >= 0.75);
}

#[tokio::test]
async fn test_run_loop_serves_commands_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["EURUSD", "GBPUSD"]);
    let engine = SignalEngine::new(&config, Box::new(provider())).unwrap();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let (handle, task) = engine.spawn(async move {
        let _ = stopped.await;
    });

    let signals = handle.generate(vec!["GBPUSD".to_string()]).await.unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].signal_type, SignalType::Sell);

    let snapshot = handle.snapshot();
    assert!(snapshot.running);
    assert!(snapshot.cycles >= 1);
    assert!(snapshot.signal("gbpusd").is_some());

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert!(!handle.snapshot().running);
    assert!(handle.generate(Vec::new()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_slow_provider_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), &["EURUSD"]);
    config.trading.request_timeout_secs = 1;
    let mut provider = provider();
    provider.delay = Some(std::time::Duration::from_secs(30));

    let mut engine = SignalEngine::new(&config, Box::new(provider)).unwrap();
    engine.start().await.unwrap();

    let report = engine.run_cycle().await;
    assert!(report.all_failed());
    assert_eq!(report.failures[0].0, "EURUSD");
    assert!(report.failures[0].1.contains("timed out after 1s"), "{:?}", report.failures);
}

#[tokio::test(start_paused = true)]
async fn test_failed_cycle_retries_after_error_backoff() {
    let dir = tempfile::tempdir().unwrap();
    // Defaults: 300s between cycles, 60s after a cycle where every symbol failed
    let config = config(dir.path(), &["XAUUSD"]);
    let engine = SignalEngine::new(&config, Box::new(provider())).unwrap();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let (handle, task) = engine.spawn(async move {
        let _ = stopped.await;
    });

    tokio::time::sleep(std::time::Duration::from_secs(61)).await;
    assert_eq!(handle.snapshot().cycles, 2);
    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
    assert_eq!(handle.snapshot().cycles, 3);

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_healthy_cycle_waits_poll_interval() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["EURUSD"]);
    let engine = SignalEngine::new(&config, Box::new(provider())).unwrap();

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let (handle, task) = engine.spawn(async move {
        let _ = stopped.await;
    });

    tokio::time::sleep(std::time::Duration::from_secs(61)).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.cycles, 1);
    assert_eq!(snapshot.signals.len(), 1);

    tokio::time::sleep(std::time::Duration::from_secs(240)).await;
    assert_eq!(handle.snapshot().cycles, 2);

    stop.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_higher_timeframes_must_confirm() {
    let dir = tempfile::tempdir().unwrap();
    let mut confirmed = config(dir.path(), &["EURUSD"]);
    confirmed.trading.confirm_timeframes = vec![Timeframe::H4, Timeframe::D1];

    // H1 trends up while H4 and D1 trend down
    let mut opposed = provider();
    opposed.by_timeframe.insert(Timeframe::H4, trending_bars(30, -1.0));
    opposed.by_timeframe.insert(Timeframe::D1, trending_bars(30, -1.0));
    let requests = opposed.requests.clone();

    let mut engine = SignalEngine::new(&confirmed, Box::new(opposed)).unwrap();
    engine.start().await.unwrap();
    let report = engine.run_cycle().await;
    assert!(report.failures.is_empty());
    assert!(report.generated.is_empty());
    assert_eq!(*requests.lock().unwrap(), vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]);

    // Agreement everywhere keeps the single-timeframe confidence
    let mut engine = SignalEngine::new(&confirmed, Box::new(provider())).unwrap();
    engine.start().await.unwrap();
    let agreed = engine.run_cycle().await.generated;

    let single = config(dir.path(), &["EURUSD"]);
    let mut engine = SignalEngine::new(&single, Box::new(provider())).unwrap();
    engine.start().await.unwrap();
    let baseline = engine.run_cycle().await.generated;

    assert_eq!(agreed.len(), 1);
    assert_eq!(agreed[0].signal_type, SignalType::Buy);
    assert_eq!(agreed[0].confidence, baseline[0].confidence);
}

#[test]
fn test_rewriting_outputs_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut output = Config::default().output;
    output.directory = dir.path().to_string_lossy().into_owned();
    let writer = OutputWriter::new(output).unwrap();
    let signals = vec![
        signal("EURUSD", SignalType::Buy, 1.1),
        signal("GBPUSD", SignalType::Sell, 1.265),
    ];

    assert!(writer.write_all(&signals).is_complete());
    let mt4 = std::fs::read(writer.path_for(OutputFormat::Mt4Csv)).unwrap();
    let mt5 = std::fs::read(writer.path_for(OutputFormat::Mt5Csv)).unwrap();
    let json = load_snapshot(writer.path_for(OutputFormat::Json)).unwrap();

    assert!(writer.write_all(&signals).is_complete());
    assert_eq!(std::fs::read(writer.path_for(OutputFormat::Mt4Csv)).unwrap(), mt4);
    assert_eq!(std::fs::read(writer.path_for(OutputFormat::Mt5Csv)).unwrap(), mt5);
    let again = load_snapshot(writer.path_for(OutputFormat::Json)).unwrap();
    assert_eq!(again.signals, json.signals);
    assert_eq!(again.total_count, json.total_count);
}
