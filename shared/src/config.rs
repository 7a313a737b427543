use std::fmt;
use std::str::FromStr;

use dotenv::dotenv;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Timeframe;

/// Largest history a single provider request may ask for
pub const MAX_HISTORY_BARS: usize = 10_000;

#[derive(Debug)]
pub struct Config {
    pub trading: TradingConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub ensemble: EnsembleConfig,
    pub provider: ProviderConfig,
    pub output: OutputConfig,
    pub notifier: NotifierConfig,
    pub server: ServerConfig,
}

/// Which symbols to poll and how often
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    pub primary_timeframe: Timeframe,
    /// Bars requested per symbol each cycle
    pub history_bars: usize,
    /// Seconds between polling cycles
    pub poll_interval_secs: u64,
    /// Seconds to wait after a failed cycle
    pub error_backoff_secs: u64,
    /// Per-call timeout for provider requests
    pub request_timeout_secs: u64,
    /// Extra timeframes that must agree with the primary one; empty disables the check
    pub confirm_timeframes: Vec<Timeframe>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbols: ["EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            primary_timeframe: Timeframe::H1,
            history_bars: 100,
            poll_interval_secs: 300,
            error_backoff_secs: 60,
            request_timeout_secs: 5,
            confirm_timeframes: Vec::new(),
        }
    }
}

/// Indicator periods and decision thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub sma_short_period: usize,
    pub sma_long_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Signals below this confidence are discarded
    pub min_confidence: f64,
    /// Minimum bars required before a decision is attempted
    pub min_bars: usize,
    /// Fixed bonus added to every confidence score
    pub permission_bonus: f64,
    /// MA separation (percent of price) at which the trend term saturates
    pub trend_saturation_pct: f64,
    /// Weighted timeframe agreement required to keep a signal
    pub min_consensus: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            sma_short_period: 5,
            sma_long_period: 20,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            min_confidence: 0.70,
            min_bars: 20,
            permission_bonus: 0.1,
            trend_saturation_pct: 0.1,
            min_consensus: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            RiskLevel::Conservative => 0.5,
            RiskLevel::Moderate => 1.0,
            RiskLevel::Aggressive => 2.0,
        }
    }
}

impl FromStr for RiskLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskLevel::Conservative),
            "moderate" => Ok(RiskLevel::Moderate),
            "aggressive" => Ok(RiskLevel::Aggressive),
            other => Err(ConfigError::InvalidValue {
                key: "RISK_LEVEL".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Stop-loss/take-profit placement and position sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Stop distance in ATRs
    pub stop_loss_multiplier: f64,
    /// Target distance in ATRs
    pub take_profit_multiplier: f64,
    /// ATR used when history is too short or the market is flat
    pub default_atr: f64,
    pub account_balance: f64,
    /// Maximum risk per trade (as fraction of balance, e.g., 0.02 = 2%)
    pub max_risk_per_trade: f64,
    /// Maximum combined risk across all signals
    pub max_portfolio_risk: f64,
    /// Maximum position value (as fraction of balance)
    pub max_position_fraction: f64,
    pub risk_level: RiskLevel,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_multiplier: 1.5,
            take_profit_multiplier: 3.0,
            default_atr: 0.001,
            account_balance: 10_000.0,
            max_risk_per_trade: 0.02,
            max_portfolio_risk: 0.20,
            max_position_fraction: 0.05,
            risk_level: RiskLevel::Moderate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    pub enabled: bool,
    /// Share of the ensemble confidence in the blended score
    pub weight: f64,
    /// Standard deviation of the injected Gaussian noise
    pub noise_std: f64,
    /// Feature rows each model looks back over
    pub lookback: usize,
    pub seed: Option<u64>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 0.3,
            noise_std: 0.1,
            lookback: 5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mock,
    Rest,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "rest" => Ok(ProviderKind::Rest),
            other => Err(ConfigError::InvalidValue {
                key: "DATA_PROVIDER".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: Option<String>,
    /// Only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    pub mock_seed: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Mock,
            base_url: None,
            api_key: None,
            mock_seed: None,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("mock_seed", &self.mock_seed)
            .finish()
    }
}

/// Output files written after each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub excel_filename: String,
    pub mt4_filename: String,
    pub mt5_filename: String,
    pub json_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "signal_output".to_string(),
            excel_filename: "genx_signals.xlsx".to_string(),
            mt4_filename: "MT4_Signals.csv".to_string(),
            mt5_filename: "MT5_Signals.csv".to_string(),
            json_filename: "genx_signals.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
            ensemble: EnsembleConfig::default(),
            provider: ProviderConfig::default(),
            output: OutputConfig::default(),
            notifier: NotifierConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        if let Ok(path) = dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };
        let defaults = Config::default();

        let trading = TradingConfig {
            symbols: env
                .string("TRADING_SYMBOLS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_uppercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.trading.symbols),
            primary_timeframe: env.parse("PRIMARY_TIMEFRAME", defaults.trading.primary_timeframe)?,
            history_bars: env.parse("HISTORY_BARS", defaults.trading.history_bars)?,
            poll_interval_secs: env.parse("SIGNAL_INTERVAL", defaults.trading.poll_interval_secs)?,
            error_backoff_secs: env.parse("ERROR_BACKOFF", defaults.trading.error_backoff_secs)?,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT", defaults.trading.request_timeout_secs)?,
            confirm_timeframes: env
                .list("CONFIRM_TIMEFRAMES")?
                .unwrap_or(defaults.trading.confirm_timeframes),
        };

        let strategy = StrategyConfig {
            sma_short_period: env.parse("SMA_SHORT_PERIOD", defaults.strategy.sma_short_period)?,
            sma_long_period: env.parse("SMA_LONG_PERIOD", defaults.strategy.sma_long_period)?,
            rsi_period: env.parse("RSI_PERIOD", defaults.strategy.rsi_period)?,
            rsi_overbought: env.parse("RSI_OVERBOUGHT", defaults.strategy.rsi_overbought)?,
            rsi_oversold: env.parse("RSI_OVERSOLD", defaults.strategy.rsi_oversold)?,
            min_confidence: env.parse("MIN_CONFIDENCE", defaults.strategy.min_confidence)?,
            min_bars: env.parse("MIN_BARS", defaults.strategy.min_bars)?,
            permission_bonus: env.parse("PERMISSION_BONUS", defaults.strategy.permission_bonus)?,
            trend_saturation_pct: env.parse("TREND_SATURATION_PCT", defaults.strategy.trend_saturation_pct)?,
            min_consensus: env.parse("MIN_CONSENSUS", defaults.strategy.min_consensus)?,
        };

        let risk = RiskConfig {
            stop_loss_multiplier: env.parse("STOP_LOSS_MULTIPLIER", defaults.risk.stop_loss_multiplier)?,
            take_profit_multiplier: env.parse("TAKE_PROFIT_MULTIPLIER", defaults.risk.take_profit_multiplier)?,
            default_atr: env.parse("DEFAULT_ATR", defaults.risk.default_atr)?,
            account_balance: env.parse("ACCOUNT_BALANCE", defaults.risk.account_balance)?,
            max_risk_per_trade: env.parse("MAX_RISK_PER_TRADE", defaults.risk.max_risk_per_trade)?,
            max_portfolio_risk: env.parse("MAX_PORTFOLIO_RISK", defaults.risk.max_portfolio_risk)?,
            max_position_fraction: env.parse("MAX_POSITION_FRACTION", defaults.risk.max_position_fraction)?,
            risk_level: env.parse("RISK_LEVEL", defaults.risk.risk_level)?,
        };

        let ensemble = EnsembleConfig {
            enabled: env.parse("ENSEMBLE_ENABLED", defaults.ensemble.enabled)?,
            weight: env.parse("ENSEMBLE_WEIGHT", defaults.ensemble.weight)?,
            noise_std: env.parse("ENSEMBLE_NOISE", defaults.ensemble.noise_std)?,
            lookback: env.parse("ENSEMBLE_LOOKBACK", defaults.ensemble.lookback)?,
            seed: env.parse_opt("ENSEMBLE_SEED")?,
        };

        let provider = ProviderConfig {
            kind: env.parse("DATA_PROVIDER", defaults.provider.kind)?,
            base_url: env.string("DATA_PROVIDER_URL"),
            api_key: env.string("DATA_PROVIDER_API_KEY"),
            mock_seed: env.parse_opt("MOCK_SEED")?,
        };

        let output = OutputConfig {
            directory: env.string("OUTPUT_DIRECTORY").unwrap_or(defaults.output.directory),
            excel_filename: env.string("EXCEL_FILENAME").unwrap_or(defaults.output.excel_filename),
            mt4_filename: env.string("MT4_FILENAME").unwrap_or(defaults.output.mt4_filename),
            mt5_filename: env.string("MT5_FILENAME").unwrap_or(defaults.output.mt5_filename),
            json_filename: env.string("JSON_FILENAME").unwrap_or(defaults.output.json_filename),
        };

        let notifier = NotifierConfig {
            webhook_url: env.string("SIGNAL_WEBHOOK_URL"),
            timeout_secs: env.parse("WEBHOOK_TIMEOUT", defaults.notifier.timeout_secs)?,
        };

        let server = ServerConfig {
            bind_addr: env.string("BIND_ADDR").unwrap_or(defaults.server.bind_addr),
        };

        Ok(Config {
            trading,
            strategy,
            risk,
            ensemble,
            provider,
            output,
            notifier,
            server,
        })
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.trading.symbols.is_empty() {
            return invalid("at least one trading symbol is required");
        }
        if self.trading.history_bars == 0 || self.trading.request_timeout_secs == 0 {
            return invalid("history_bars and request_timeout must be positive");
        }
        if self.trading.history_bars > MAX_HISTORY_BARS {
            return Err(ConfigError::Invalid(format!("history_bars must not exceed {}", MAX_HISTORY_BARS)));
        }
        if self.trading.history_bars < self.strategy.min_bars {
            return invalid("history_bars must cover min_bars");
        }
        let s = &self.strategy;
        if s.sma_short_period == 0 || s.rsi_period == 0 {
            return invalid("indicator periods must be positive");
        }
        if s.sma_short_period >= s.sma_long_period {
            return invalid("short SMA period must be below long SMA period");
        }
        if !(0.0..=100.0).contains(&s.rsi_oversold) || s.rsi_oversold >= s.rsi_overbought || s.rsi_overbought > 100.0 {
            return invalid("RSI bands must satisfy 0 <= oversold < overbought <= 100");
        }
        if !(0.0..=1.0).contains(&s.min_confidence) {
            return invalid("min_confidence must lie in [0, 1]");
        }
        if s.trend_saturation_pct <= 0.0 {
            return invalid("trend_saturation_pct must be positive");
        }
        if !(0.0..=1.0).contains(&s.min_consensus) {
            return invalid("min_consensus must lie in [0, 1]");
        }
        let r = &self.risk;
        if r.stop_loss_multiplier <= 0.0 || r.take_profit_multiplier <= 0.0 || r.default_atr <= 0.0 {
            return invalid("ATR multipliers and default ATR must be positive");
        }
        if r.account_balance <= 0.0 || r.max_position_fraction <= 0.0 {
            return invalid("account balance and position fraction must be positive");
        }
        if !(0.0..=1.0).contains(&self.ensemble.weight) || self.ensemble.noise_std < 0.0 {
            return invalid("ensemble weight must lie in [0, 1] and noise must be non-negative");
        }
        if self.provider.kind == ProviderKind::Rest && self.provider.base_url.is_none() {
            return invalid("DATA_PROVIDER_URL is required for the rest provider");
        }
        Ok(())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    /// Comma-separated values; `None` when unset
    fn list<T: FromStr>(&self, key: &str) -> Result<Option<Vec<T>>, ConfigError> {
        let raw = match self.string(key) {
            Some(raw) => raw,
            None => return Ok(None),
        };
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| {
                item.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: item.to_string(),
                })
            })
            .collect::<Result<Vec<T>, _>>()
            .map(Some)
    }

    fn parse_opt<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.string(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                }),
        }
    }
}
