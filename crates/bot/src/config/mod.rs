pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Load and merge all config JSON files into a single [`BotConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json       logging, email delivery
///   monitor.json   instruments, data source, scheduling, market hours
///   signals.json   indicator periods, entry rules, alerts
/// ```
///
/// # Environment variable overrides
///
/// | Env Var                   | Config Field                         |
/// |---------------------------|--------------------------------------|
/// | `CHECK_INTERVAL`          | `monitor.poll_interval_seconds`      |
/// | `MAX_WORKERS`             | `monitor.max_workers`                |
/// | `CANDLE_INTERVAL`         | `monitor.data_source.interval`       |
/// | `PROXIMITY_THRESHOLD_PCT` | `signals.proximity.threshold_pct`    |
/// | `ALERT_COOLDOWN_SECONDS`  | `signals.alerts.cooldown_seconds`    |
/// | `EMAIL_ALERTS`            | `app.email.enabled`                  |
/// | `SMTP_SERVER`             | `app.email.smtp_host`                |
/// | `SMTP_PORT`               | `app.email.smtp_port`                |
/// | `SMTP_EMAIL`              | `app.email.username`                 |
/// | `RECIPIENT_EMAIL`         | `app.email.to`                       |
///
/// The SMTP password itself is only ever read from the env var named by
/// `app.email.password_env` (default `SMTP_PASSWORD`).
pub fn load_config(config_dir: &Path) -> Result<BotConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig =
        serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let monitor: MonitorConfig =
        serde_json::from_str(&read("monitor.json")?).context("parsing monitor.json")?;

    let signals: SignalConfig =
        serde_json::from_str(&read("signals.json")?).context("parsing signals.json")?;

    let mut config = BotConfig {
        app,
        monitor,
        signals,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Parse failures are logged and skipped
/// (the JSON value remains).
fn apply_env_overrides(config: &mut BotConfig) {
    // -- Scheduling ----------------------------------------------------------
    if let Some(val) = env_parse::<u64>("CHECK_INTERVAL") {
        info!(val, "env override: CHECK_INTERVAL");
        config.monitor.poll_interval_seconds = val;
    }

    if let Some(val) = env_parse::<usize>("MAX_WORKERS") {
        info!(val, "env override: MAX_WORKERS");
        config.monitor.max_workers = val;
    }

    // -- Data source ---------------------------------------------------------
    if let Some(val) = env_string("CANDLE_INTERVAL") {
        info!(%val, "env override: CANDLE_INTERVAL");
        config.monitor.data_source.interval = val;
    }

    // -- Signals -------------------------------------------------------------
    if let Some(val) = env_decimal("PROXIMITY_THRESHOLD_PCT") {
        info!(%val, "env override: PROXIMITY_THRESHOLD_PCT");
        config.signals.proximity.threshold_pct = val;
    }

    if let Some(val) = env_parse::<i64>("ALERT_COOLDOWN_SECONDS") {
        info!(val, "env override: ALERT_COOLDOWN_SECONDS");
        config.signals.alerts.cooldown_seconds = val;
    }

    // -- Email ---------------------------------------------------------------
    if let Some(val) = env_parse::<bool>("EMAIL_ALERTS") {
        info!(val, "env override: EMAIL_ALERTS");
        config.app.email.enabled = val;
    }

    if let Some(val) = env_string("SMTP_SERVER") {
        info!(%val, "env override: SMTP_SERVER");
        config.app.email.smtp_host = val;
    }

    if let Some(val) = env_parse::<u16>("SMTP_PORT") {
        info!(val, "env override: SMTP_PORT");
        config.app.email.smtp_port = val;
    }

    if let Some(val) = env_string("SMTP_EMAIL") {
        info!(%val, "env override: SMTP_EMAIL");
        config.app.email.username = val;
    }

    if let Some(val) = env_string("RECIPIENT_EMAIL") {
        info!(%val, "env override: RECIPIENT_EMAIL");
        config.app.email.to = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    let parsed = raw.parse().ok();
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparseable env override");
    }
    parsed
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    let raw = env_string(key)?;
    let parsed = Decimal::from_str(&raw).ok();
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparseable env override");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;
    use std::path::PathBuf;

    use crate::core::alert_throttle::AlertScope;

    fn project_config_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
    }

    // -----------------------------------------------------------------------
    // Helper: write a minimal set of config JSON files to a temp dir.
    // -----------------------------------------------------------------------

    fn write_test_configs(dir: &Path) {
        std::fs::write(
            dir.join("app.json"),
            r#"{ "logging": { "log_dir": "logs" } }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("monitor.json"),
            r#"{
                "poll_interval_seconds": 60,
                "max_workers": 2,
                "instruments": [
                    { "name": "Nifty50", "symbol": "^NSEI" },
                    { "name": "Reliance", "symbol": "RELIANCE.NS" }
                ],
                "data_source": { "interval": "15m", "history_range": "10d" }
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("signals.json"),
            r#"{
                "indicators": {
                    "smma_periods": [9, 20],
                    "smma_fast": 9,
                    "smma_slow": 20,
                    "rsi_period": 14,
                    "macd_fast": 12,
                    "macd_slow": 26,
                    "macd_signal": 9,
                    "volume_window": 20
                },
                "proximity": { "threshold_pct": "0.5" },
                "entry": {
                    "long_rsi": { "lower": "40", "upper": "70" },
                    "short_rsi": { "lower": "30", "upper": "60" },
                    "volume_multiplier": "1.2"
                },
                "targets": { "target_1_multiple": "1.5", "target_2_multiple": "2.5" },
                "alerts": { "scope": "per_instrument" }
            }"#,
        )
        .unwrap();
    }

    // -----------------------------------------------------------------------
    // Env cleanup helper
    // -----------------------------------------------------------------------

    /// Remove all bot-related env vars so tests don't interfere with each other.
    fn clean_bot_env() {
        for key in [
            "CHECK_INTERVAL",
            "MAX_WORKERS",
            "CANDLE_INTERVAL",
            "PROXIMITY_THRESHOLD_PCT",
            "ALERT_COOLDOWN_SECONDS",
            "EMAIL_ALERTS",
            "SMTP_SERVER",
            "SMTP_PORT",
            "SMTP_EMAIL",
            "RECIPIENT_EMAIL",
            "SMTP_PASSWORD",
        ] {
            std::env::remove_var(key);
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    #[serial]
    fn test_load_real_configs() {
        clean_bot_env();
        let dir = project_config_dir();
        if !dir.exists() {
            eprintln!("skipping: config dir not found at {}", dir.display());
            return;
        }
        let config = load_config(&dir).expect("config should load and validate");
        assert_eq!(config.monitor.instruments.len(), 9);
        assert_eq!(config.signals.indicators.smma_periods, vec![9, 20]);
        assert_eq!(config.monitor.data_source.interval, "15m");
        assert!(config.monitor.market_hours().unwrap().is_some());
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_load_test_configs_with_defaults() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        let config = load_config(tmp.path()).expect("test config should load");

        assert_eq!(config.app.logging.file_name, "smma-bot.log");
        assert_eq!(config.monitor.max_workers, 2);
        assert_eq!(config.monitor.market_closed_sleep_seconds, 300);
        assert_eq!(config.monitor.min_candles, 35);
        assert_eq!(config.monitor.data_source.max_retries, 3);
        assert_eq!(
            config.monitor.data_source.base_url,
            "https://query1.finance.yahoo.com"
        );
        assert!(config.monitor.market_hours.enabled);
        assert!(config.signals.entry.require_rsi_band);
        assert!(!config.signals.entry.require_macd);
        assert_eq!(config.signals.alerts.cooldown_seconds, 300);
        assert_eq!(config.signals.alerts.scope, AlertScope::PerInstrument);
        assert!(!config.app.email.enabled);
        assert_eq!(config.app.email.smtp_port, 587);
        assert_eq!(config.app.email.password_env, "SMTP_PASSWORD");

        let instruments = config.instruments();
        assert_eq!(instruments[1].id.as_str(), "Reliance");
        assert_eq!(instruments[1].symbol, "RELIANCE.NS");
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_missing_config_file_errors() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("failed to read config file"),
            "unexpected error: {err}"
        );
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_malformed_json_errors() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        std::fs::write(tmp.path().join("signals.json"), "{ not json").unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("signals.json"), "unexpected error: {err}");
        clean_bot_env();
    }

    /// Load the temp-dir configs with `vars` set, then clear the environment.
    fn load_with_env(vars: &[(&str, &str)]) -> Result<BotConfig> {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let loaded = load_config(tmp.path());
        clean_bot_env();
        loaded
    }

    #[test]
    #[serial]
    fn test_env_override_scheduling() {
        let config = load_with_env(&[("CHECK_INTERVAL", "120"), ("MAX_WORKERS", "8")]).unwrap();
        assert_eq!(config.monitor.poll_interval_seconds, 120);
        assert_eq!(config.monitor.max_workers, 8);
    }

    #[test]
    #[serial]
    fn test_env_override_candle_interval() {
        let config = load_with_env(&[("CANDLE_INTERVAL", "5m")]).unwrap();
        assert_eq!(config.monitor.data_source.interval, "5m");
    }

    #[test]
    #[serial]
    fn test_env_override_oversized_interval_rejected() {
        let err = load_with_env(&[("CANDLE_INTERVAL", "999999999999999999m")]).unwrap_err();
        assert!(err.to_string().contains("interval"), "unexpected error: {err}");
    }

    #[test]
    #[serial]
    fn test_env_override_proximity_is_percent() {
        let config = load_with_env(&[("PROXIMITY_THRESHOLD_PCT", "1.5")]).unwrap();
        assert_eq!(config.signals.proximity.threshold_pct, dec!(1.5));
        assert_eq!(config.engine_params().proximity_threshold, dec!(0.015));
    }

    #[test]
    #[serial]
    fn test_env_override_cooldown() {
        let config = load_with_env(&[("ALERT_COOLDOWN_SECONDS", "600")]).unwrap();
        assert_eq!(config.engine_params().alert_cooldown_seconds, 600);
    }

    #[test]
    #[serial]
    fn test_env_override_email() {
        let config = load_with_env(&[
            ("EMAIL_ALERTS", "true"),
            ("SMTP_SERVER", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_EMAIL", "alerts@example.com"),
            ("RECIPIENT_EMAIL", "desk@example.com"),
            ("SMTP_PASSWORD", "hunter2"),
        ])
        .unwrap();
        let email = &config.app.email;
        assert!(email.enabled);
        assert_eq!(email.smtp_host, "smtp.example.com");
        assert_eq!(email.smtp_port, 2525);
        assert_eq!(email.sender(), "alerts@example.com");
        assert_eq!(email.to, "desk@example.com");
    }

    #[test]
    #[serial]
    fn test_email_enabled_without_password_rejected() {
        let err = load_with_env(&[
            ("EMAIL_ALERTS", "true"),
            ("SMTP_EMAIL", "alerts@example.com"),
            ("RECIPIENT_EMAIL", "desk@example.com"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("SMTP_PASSWORD"), "unexpected error: {err}");
    }

    #[test]
    #[serial]
    fn test_env_override_empty_string_ignored() {
        let config = load_with_env(&[("MAX_WORKERS", "")]).unwrap();
        assert_eq!(config.monitor.max_workers, 2);
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_parse_ignored() {
        let config = load_with_env(&[("CHECK_INTERVAL", "soon")]).unwrap();
        assert_eq!(config.monitor.poll_interval_seconds, 60);
    }

    #[test]
    #[serial]
    fn test_env_override_still_validated() {
        let err = load_with_env(&[("MAX_WORKERS", "0")]).unwrap_err();
        assert!(err.to_string().contains("max_workers"), "unexpected error: {err}");
    }
}
