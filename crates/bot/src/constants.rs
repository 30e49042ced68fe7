use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Indicator defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_SMMA_FAST: usize = 9;
pub const DEFAULT_SMMA_SLOW: usize = 20;
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_MACD_FAST: usize = 12;
pub const DEFAULT_MACD_SLOW: usize = 26;
pub const DEFAULT_MACD_SIGNAL: usize = 9;

/// Trailing window (including the current candle) for average volume.
pub const DEFAULT_VOLUME_WINDOW: usize = 20;

/// Current volume must exceed the trailing average by this multiple.
pub const DEFAULT_VOLUME_MULTIPLIER: Decimal = dec!(1.2);

// ---------------------------------------------------------------------------
// Signal defaults
// ---------------------------------------------------------------------------

/// Proximity band as a fraction of the indicator value (0.5%).
pub const DEFAULT_PROXIMITY_THRESHOLD: Decimal = dec!(0.005);

pub const DEFAULT_LONG_RSI_LOWER: Decimal = dec!(40);
pub const DEFAULT_LONG_RSI_UPPER: Decimal = dec!(70);
pub const DEFAULT_SHORT_RSI_LOWER: Decimal = dec!(30);
pub const DEFAULT_SHORT_RSI_UPPER: Decimal = dec!(60);

/// Reward multiples of the entry risk for the two profit targets.
pub const DEFAULT_TARGET_1_MULTIPLE: Decimal = dec!(1.5);
pub const DEFAULT_TARGET_2_MULTIPLE: Decimal = dec!(2.5);

/// Alert cooldown per key.
pub const DEFAULT_ALERT_COOLDOWN_SECONDS: i64 = 300;

// ---------------------------------------------------------------------------
// Driver defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_WORKERS: usize = 5;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_MARKET_CLOSED_SLEEP_SECONDS: u64 = 300;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_FACTOR: u64 = 2;

/// Minimum candles a fetched series must carry before evaluation.
pub const DEFAULT_MIN_CANDLES: usize = 35;

/// Yahoo Finance chart API.
pub const YAHOO_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// STARTTLS submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;
/// Env var read for the SMTP password; never stored in config files.
pub const DEFAULT_SMTP_PASSWORD_ENV: &str = "SMTP_PASSWORD";

/// India Standard Time, UTC+05:30.
pub const IST_UTC_OFFSET_MINUTES: i32 = 330;
