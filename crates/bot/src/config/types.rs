use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::constants::{
    DEFAULT_ALERT_COOLDOWN_SECONDS, DEFAULT_BACKOFF_FACTOR, DEFAULT_MARKET_CLOSED_SLEEP_SECONDS,
    DEFAULT_MAX_RETRIES, DEFAULT_MAX_WORKERS, DEFAULT_MIN_CANDLES,
    DEFAULT_POLL_INTERVAL_SECONDS, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PASSWORD_ENV, DEFAULT_SMTP_PORT,
    IST_UTC_OFFSET_MINUTES, YAHOO_CHART_BASE_URL,
};
use crate::core::alert_throttle::AlertScope;
use crate::core::data_quality::MarketHours;
use crate::core::monitor::EngineParams;
use crate::core::trade_state::{EntryRules, RsiBand};
use crate::errors::BotError;
use crate::types::Instrument;

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub app: AppConfig,
    pub monitor: MonitorConfig,
    pub signals: SignalConfig,
}

impl BotConfig {
    /// Engine parameters shared by every instrument monitor.
    pub fn engine_params(&self) -> EngineParams {
        let s = &self.signals;
        EngineParams {
            smma_periods: s.indicators.smma_periods.clone(),
            smma_fast: s.indicators.smma_fast,
            smma_slow: s.indicators.smma_slow,
            rsi_period: s.indicators.rsi_period,
            use_macd: s.indicators.use_macd,
            macd_fast: s.indicators.macd_fast,
            macd_slow: s.indicators.macd_slow,
            macd_signal: s.indicators.macd_signal,
            volume_window: s.indicators.volume_window,
            proximity_threshold: s.proximity.threshold_fraction(),
            detect_crossovers: s.alerts.crossovers,
            detect_proximity: s.alerts.proximity,
            track_trades: s.alerts.trades,
            entry: EntryRules {
                long_rsi: s.entry.long_rsi,
                short_rsi: s.entry.short_rsi,
                require_rsi_band: s.entry.require_rsi_band,
                require_volume: s.entry.require_volume,
                volume_multiplier: s.entry.volume_multiplier,
                require_macd: s.entry.require_macd,
                target_1_multiple: s.targets.target_1_multiple,
                target_2_multiple: s.targets.target_2_multiple,
            },
            alert_cooldown_seconds: s.alerts.cooldown_seconds,
            alert_scope: s.alerts.scope,
        }
    }

    pub fn instruments(&self) -> Vec<Instrument> {
        self.monitor
            .instruments
            .iter()
            .map(|i| Instrument::new(i.name.clone(), i.symbol.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

fn default_log_file() -> String {
    "smma-bot.log".into()
}

/// SMTP delivery of signal events. The password is read from the env var
/// named by `password_env` when the notifier is built.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP login. Also the sender address when `from` is empty.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default = "default_smtp_password_env")]
    pub password_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl EmailConfig {
    pub fn sender(&self) -> &str {
        if self.from.is_empty() {
            &self.username
        } else {
            &self.from
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            from: String::new(),
            to: String::new(),
            password_env: default_smtp_password_env(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_smtp_host() -> String {
    DEFAULT_SMTP_HOST.into()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_smtp_password_env() -> String {
    DEFAULT_SMTP_PASSWORD_ENV.into()
}

// ---------------------------------------------------------------------------
// monitor.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_market_closed_sleep")]
    pub market_closed_sleep_seconds: u64,
    #[serde(default = "default_min_candles")]
    pub min_candles: usize,
    pub instruments: Vec<InstrumentConfig>,
    pub data_source: DataSourceConfig,
    #[serde(default)]
    pub market_hours: MarketHoursConfig,
}

impl MonitorConfig {
    /// Trading session gate, or `None` when disabled.
    pub fn market_hours(&self) -> Result<Option<MarketHours>, BotError> {
        let mh = &self.market_hours;
        if !mh.enabled {
            return Ok(None);
        }
        Ok(Some(MarketHours {
            open: parse_session_time("market_hours.open", &mh.open)?,
            close: parse_session_time("market_hours.close", &mh.close)?,
            utc_offset_minutes: mh.utc_offset_minutes,
            weekdays_only: mh.weekdays_only,
        }))
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`).
pub fn parse_session_time(field: &str, value: &str) -> Result<NaiveTime, BotError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| BotError::Config(format!("{field}: expected HH:MM, got {value:?}")))
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECONDS
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_market_closed_sleep() -> u64 {
    DEFAULT_MARKET_CLOSED_SLEEP_SECONDS
}

fn default_min_candles() -> usize {
    DEFAULT_MIN_CANDLES
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Display name, also the instrument's identity in events.
    pub name: String,
    /// Provider ticker.
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Candle length, e.g. `15m`.
    pub interval: String,
    /// History requested per fetch, e.g. `10d`.
    pub history_range: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u64,
}

fn default_base_url() -> String {
    YAHOO_CHART_BASE_URL.into()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_backoff_factor() -> u64 {
    DEFAULT_BACKOFF_FACTOR
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketHoursConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub open: String,
    pub close: String,
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_true")]
    pub weekdays_only: bool,
}

impl Default for MarketHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            open: "09:15".into(),
            close: "15:30".into(),
            utc_offset_minutes: IST_UTC_OFFSET_MINUTES,
            weekdays_only: true,
        }
    }
}

fn default_utc_offset() -> i32 {
    IST_UTC_OFFSET_MINUTES
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// signals.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SignalConfig {
    pub indicators: IndicatorConfig,
    pub proximity: ProximityConfig,
    pub entry: EntryConfig,
    pub targets: TargetConfig,
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorConfig {
    /// SMMA periods watched for crossover and proximity alerts.
    pub smma_periods: Vec<usize>,
    pub smma_fast: usize,
    pub smma_slow: usize,
    pub rsi_period: usize,
    #[serde(default = "default_true")]
    pub use_macd: bool,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProximityConfig {
    /// Band half-width in percent of the indicator value.
    #[serde(with = "rust_decimal::serde::str")]
    pub threshold_pct: Decimal,
}

impl ProximityConfig {
    pub fn threshold_fraction(&self) -> Decimal {
        self.threshold_pct / dec!(100)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntryConfig {
    #[serde(default = "default_true")]
    pub require_rsi_band: bool,
    pub long_rsi: RsiBand,
    pub short_rsi: RsiBand,
    #[serde(default = "default_true")]
    pub require_volume: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume_multiplier: Decimal,
    #[serde(default)]
    pub require_macd: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(with = "rust_decimal::serde::str")]
    pub target_1_multiple: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_2_multiple: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_true")]
    pub crossovers: bool,
    #[serde(default = "default_true")]
    pub proximity: bool,
    #[serde(default = "default_true")]
    pub trades: bool,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: i64,
    #[serde(default)]
    pub scope: AlertScope,
}

fn default_cooldown() -> i64 {
    DEFAULT_ALERT_COOLDOWN_SECONDS
}
