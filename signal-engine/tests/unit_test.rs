//! Unit tests for signal-engine modules

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use shared::{Bar, Config, Signal, SignalType, Timeframe};
    use signal_engine::data::{DataProvider, MockDataProvider};
    use signal_engine::features::{FeatureConfig, FeatureEngine};
    use signal_engine::indicators::{Indicator, MACD, RSI, SMA};
    use signal_engine::output::write_mt4;
    use signal_engine::strategy::{DecisionConfig, SignalGenerator, SignalValidator};

    /// Closes rising half a pip per bar on average, with 2-pip pullbacks
    fn trending_bars(count: usize, direction: f64) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
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

    fn generate(bars: &[Bar]) -> Option<Signal> {
        let features = FeatureEngine::new(FeatureConfig::default()).unwrap();
        let rows = features.compute(bars).unwrap();
        SignalGenerator::new(DecisionConfig::default()).generate("EURUSD", Timeframe::H1, &rows)
    }

    #[test]
    fn test_sma_indicator() {
        let mut sma = SMA::new(3).unwrap();
        assert_eq!(sma.name(), "SMA");
        for value in [1.0, 2.0, 3.0, 4.0] {
            sma.update(value);
        }
        assert!(sma.is_ready());
        assert!((sma.value().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_indicator() {
        let mut rsi = RSI::new(14).unwrap();
        assert_eq!(rsi.name(), "RSI");
        assert_eq!(rsi.period(), 14);
        assert!(!rsi.is_ready());

        for i in 0..20 {
            rsi.update(100.0 + i as f64);
        }
        assert!(rsi.is_ready());
        let value = rsi.value().unwrap();
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn test_macd_indicator() {
        let mut macd = MACD::new(12, 26, 9).unwrap();
        for i in 0..30 {
            macd.update(100.0 + i as f64);
        }
        assert!(!macd.is_ready());
        for i in 30..50 {
            macd.update(100.0 + i as f64);
        }
        assert!(macd.is_ready());
        assert!(macd.macd().unwrap() > 0.0);
    }

    #[test]
    fn test_uptrend_emits_buy() {
        let signal = generate(&trending_bars(20, 1.0)).expect("uptrend should produce a signal");

        assert_eq!(signal.signal_type, SignalType::Buy);
        assert!(signal.confidence >= 0.6);
        assert!(signal.stop_loss < signal.entry_price && signal.entry_price < signal.take_profit);
        assert!((signal.risk_reward_ratio - 2.0).abs() < 0.1);
        assert!(SignalValidator::validate(&signal).is_ok());
    }

    #[test]
    fn test_downtrend_emits_sell() {
        let signal = generate(&trending_bars(30, -1.0)).expect("downtrend should produce a signal");

        assert_eq!(signal.signal_type, SignalType::Sell);
        assert!(signal.take_profit < signal.entry_price && signal.entry_price < signal.stop_loss);
    }

    #[test]
    fn test_short_history_yields_no_signal() {
        let bars = trending_bars(9, 1.0);
        let rows = FeatureEngine::new(FeatureConfig::default()).unwrap().compute(&bars).unwrap();
        assert_eq!(rows.len(), 9);
        assert!(rows.iter().all(|r| !r.warm && r.rsi == 50.0));
        assert!(generate(&bars).is_none());
    }

    #[test]
    fn test_flat_market_yields_no_signal() {
        let start = Utc::now();
        let bars: Vec<Bar> = (0..40)
            .map(|i| Bar::new(start + Duration::hours(i), 1.1, 1.1001, 1.0999, 1.1, 1000.0))
            .collect();
        assert!(generate(&bars).is_none());
    }

    #[tokio::test]
    async fn test_emitted_signals_respect_threshold() {
        let mut config = Config::default();
        config.strategy.min_confidence = 0.85;
        let features = FeatureEngine::new(FeatureConfig::from(&config)).unwrap();
        let generator = SignalGenerator::new(DecisionConfig::from(&config));

        let mut provider = MockDataProvider::with_seed(2024);
        provider.connect().await;

        for _ in 0..10 {
            for symbol in provider.supported_symbols() {
                let bars = provider.get_historical_data(&symbol, Timeframe::H1, 100).await.unwrap();
                let rows = features.compute(&bars).unwrap();
                if let Some(signal) = generator.generate(&symbol, Timeframe::H1, &rows) {
                    assert!(signal.confidence >= 0.85, "{:?}", signal);
                    assert!(signal.levels_straddle_entry(), "{:?}", signal);
                }
            }
        }
    }

    #[test]
    fn test_mt4_row_format() {
        let signal = Signal {
            symbol: "EURUSD".to_string(),
            signal_type: SignalType::Buy,
            entry_price: 1.1,
            stop_loss: 1.098,
            take_profit: 1.104,
            confidence: 0.8,
            timestamp: Utc::now(),
            timeframe: Timeframe::H1,
            risk_reward_ratio: 2.0,
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        write_mt4(&[signal], file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "Symbol,Signal,Entry,StopLoss,TakeProfit,Confidence,Timeframe");
        assert_eq!(lines[1], "EURUSD,BUY,1.10000,1.09800,1.10400,0.800,H1");
    }
}
