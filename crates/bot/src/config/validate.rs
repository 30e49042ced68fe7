use std::collections::HashSet;

use anyhow::{bail, Result};
use lettre::message::Mailbox;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::{parse_session_time, BotConfig};
use crate::core::data_quality::parse_interval_seconds;
use crate::core::trade_state::RsiBand;

/// Validate invariants across the merged config that serde alone cannot enforce.
///
/// Every violation is collected so one run reports all of them. Called
/// automatically by [`super::load_config`].
pub fn validate_config(config: &BotConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_monitor_config(config, &mut errors);
    validate_indicator_config(config, &mut errors);
    validate_entry_config(config, &mut errors);
    validate_alert_config(config, &mut errors);
    validate_email_config(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Monitor config
// ---------------------------------------------------------------------------

fn validate_monitor_config(config: &BotConfig, errors: &mut Vec<String>) {
    let m = &config.monitor;

    if m.max_workers == 0 {
        errors.push("monitor.max_workers must be >= 1".into());
    }
    if m.poll_interval_seconds == 0 {
        errors.push("monitor.poll_interval_seconds must be > 0".into());
    }

    if m.instruments.is_empty() {
        errors.push("monitor.instruments: at least one instrument is required".into());
    }
    let mut seen = HashSet::new();
    for inst in &m.instruments {
        if inst.name.is_empty() || inst.symbol.is_empty() {
            errors.push(format!(
                "monitor.instruments: name and symbol must be set (got {:?} / {:?})",
                inst.name, inst.symbol
            ));
        }
        if !seen.insert(inst.name.as_str()) {
            errors.push(format!("monitor.instruments: duplicate name {:?}", inst.name));
        }
    }

    let ds = &m.data_source;
    if parse_interval_seconds(&ds.interval).is_none() {
        errors.push(format!(
            "monitor.data_source.interval: unsupported value {:?}",
            ds.interval
        ));
    }
    if ds.history_range.is_empty() {
        errors.push("monitor.data_source.history_range is empty".into());
    }
    if ds.base_url.is_empty() {
        errors.push("monitor.data_source.base_url is empty".into());
    }
    if ds.max_retries == 0 {
        errors.push("monitor.data_source.max_retries must be >= 1".into());
    }

    let mh = &m.market_hours;
    if mh.enabled {
        let open = parse_session_time("monitor.market_hours.open", &mh.open);
        let close = parse_session_time("monitor.market_hours.close", &mh.close);
        match (open, close) {
            (Ok(o), Ok(c)) if o >= c => errors.push(format!(
                "monitor.market_hours: open ({}) must be before close ({})",
                mh.open, mh.close
            )),
            (Ok(_), Ok(_)) => {}
            (o, c) => {
                for e in [o.err(), c.err()].into_iter().flatten() {
                    errors.push(e.to_string());
                }
            }
        }
        if mh.utc_offset_minutes.abs() >= 24 * 60 {
            errors.push(format!(
                "monitor.market_hours.utc_offset_minutes out of range: {}",
                mh.utc_offset_minutes
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Indicator config
// ---------------------------------------------------------------------------

fn validate_indicator_config(config: &BotConfig, errors: &mut Vec<String>) {
    let ind = &config.signals.indicators;

    if ind.smma_periods.is_empty() {
        errors.push("signals.indicators.smma_periods must not be empty".into());
    }
    if ind.smma_periods.iter().any(|&p| p == 0) {
        errors.push("signals.indicators.smma_periods: periods must be > 0".into());
    }

    for (name, value) in [
        ("smma_fast", ind.smma_fast),
        ("smma_slow", ind.smma_slow),
        ("rsi_period", ind.rsi_period),
        ("macd_fast", ind.macd_fast),
        ("macd_slow", ind.macd_slow),
        ("macd_signal", ind.macd_signal),
        ("volume_window", ind.volume_window),
    ] {
        if value == 0 {
            errors.push(format!("signals.indicators.{name} must be > 0"));
        }
    }

    if ind.smma_fast >= ind.smma_slow {
        errors.push(format!(
            "signals.indicators: smma_fast ({}) must be < smma_slow ({})",
            ind.smma_fast, ind.smma_slow
        ));
    }
    if ind.macd_fast >= ind.macd_slow {
        errors.push(format!(
            "signals.indicators: macd_fast ({}) must be < macd_slow ({})",
            ind.macd_fast, ind.macd_slow
        ));
    }

    let lookback = config.engine_params().required_lookback();
    if config.monitor.min_candles < lookback {
        errors.push(format!(
            "monitor.min_candles ({}) is below the indicator lookback ({lookback})",
            config.monitor.min_candles
        ));
    }

    let pct = config.signals.proximity.threshold_pct;
    if pct <= Decimal::ZERO || pct >= dec!(100) {
        errors.push(format!(
            "signals.proximity.threshold_pct must be in (0, 100), got {pct}"
        ));
    }
}

// ---------------------------------------------------------------------------
// Entry rules
// ---------------------------------------------------------------------------

fn validate_entry_config(config: &BotConfig, errors: &mut Vec<String>) {
    let entry = &config.signals.entry;

    check_rsi_band("signals.entry.long_rsi", &entry.long_rsi, errors);
    check_rsi_band("signals.entry.short_rsi", &entry.short_rsi, errors);

    if entry.volume_multiplier <= Decimal::ZERO {
        errors.push(format!(
            "signals.entry.volume_multiplier must be > 0, got {}",
            entry.volume_multiplier
        ));
    }

    let t = &config.signals.targets;
    if t.target_1_multiple <= Decimal::ZERO {
        errors.push("signals.targets.target_1_multiple must be > 0".into());
    }
    if t.target_2_multiple <= t.target_1_multiple {
        errors.push(format!(
            "signals.targets: target_2_multiple ({}) must exceed target_1_multiple ({})",
            t.target_2_multiple, t.target_1_multiple
        ));
    }

    if entry.require_macd && !config.signals.indicators.use_macd {
        errors.push("signals.entry.require_macd needs signals.indicators.use_macd".into());
    }
}

fn check_rsi_band(field: &str, band: &RsiBand, errors: &mut Vec<String>) {
    if band.lower < Decimal::ZERO || band.upper > dec!(100) || band.lower >= band.upper {
        errors.push(format!(
            "{field}: expected 0 <= lower < upper <= 100, got ({}, {})",
            band.lower, band.upper
        ));
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

fn validate_alert_config(config: &BotConfig, errors: &mut Vec<String>) {
    let alerts = &config.signals.alerts;

    if alerts.cooldown_seconds < 0 {
        errors.push(format!(
            "signals.alerts.cooldown_seconds must be >= 0, got {}",
            alerts.cooldown_seconds
        ));
    }
    if !alerts.crossovers && !alerts.proximity && !alerts.trades {
        errors.push("signals.alerts: every signal type is disabled".into());
    }
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

fn validate_email_config(config: &BotConfig, errors: &mut Vec<String>) {
    let email = &config.app.email;
    if !email.enabled {
        return;
    }

    if email.smtp_host.is_empty() {
        errors.push("app.email.smtp_host must not be empty".into());
    }
    if email.smtp_port == 0 {
        errors.push("app.email.smtp_port must be > 0".into());
    }
    if email.username.is_empty() {
        errors.push("app.email.username must not be empty (SMTP_EMAIL)".into());
    }
    for (field, address) in [("from", email.sender()), ("to", email.to.as_str())] {
        if address.parse::<Mailbox>().is_err() {
            errors.push(format!("app.email.{field}: invalid address {address:?}"));
        }
    }
    if std::env::var(&email.password_env)
        .map(|v| v.is_empty())
        .unwrap_or(true)
    {
        errors.push(format!(
            "app.email: {} env var is required when email is enabled",
            email.password_env
        ));
    }
}
