//! Delivery of signal events.
//!
//! The monitor only produces [`SignalEvent`] values; a [`Notifier`] decides
//! where they go. [`LogNotifier`] writes one structured log line per event,
//! [`ChannelNotifier`] forwards events to an in-process consumer and
//! [`EmailNotifier`] mails a plain-text alert over SMTP.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::EmailConfig;
use crate::errors::BotError;
use crate::types::{Instrument, InstrumentId, SignalEvent};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, instrument: &Instrument, event: &SignalEvent) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Log sink
// ═══════════════════════════════════════════════════════════════════════════

/// Emits every event through `tracing` at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, instrument: &Instrument, event: &SignalEvent) -> Result<()> {
        let name = instrument.id.as_str();
        let symbol = instrument.symbol.as_str();

        match event {
            SignalEvent::Crossover(e) => info!(
                instrument = name,
                symbol,
                period = e.period,
                direction = e.direction.as_str(),
                price = %e.price,
                smma = %e.indicator_value,
                "SMMA crossover"
            ),
            SignalEvent::Proximity(e) => info!(
                instrument = name,
                symbol,
                period = e.period,
                direction = e.direction.as_str(),
                price = %e.price,
                smma = %e.indicator_value,
                "price near SMMA"
            ),
            SignalEvent::Entry(e) => info!(
                instrument = name,
                symbol,
                side = e.side.as_str(),
                entry = %e.entry,
                stop_loss = %e.stop_loss,
                target_1 = %e.target_1,
                target_2 = %e.target_2,
                rsi = %e.snapshot.rsi,
                macd = e.snapshot.macd_signal().map(|m| m.as_str()).unwrap_or("n/a"),
                "trade entry"
            ),
            SignalEvent::Exit(e) => info!(
                instrument = name,
                symbol,
                side = e.side.as_str(),
                entry = %e.entry,
                exit = %e.exit,
                reason = e.reason.as_str(),
                pnl = %e.pnl,
                pnl_pct = %e.pnl_percent,
                held_s = e.duration_seconds,
                "trade exit"
            ),
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Channel sink
// ═══════════════════════════════════════════════════════════════════════════

/// Forwards events over a bounded `mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<(InstrumentId, SignalEvent)>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::Sender<(InstrumentId, SignalEvent)>) -> Self {
        Self { tx }
    }

    /// Notifier plus the receiving half, with room for `capacity` events.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<(InstrumentId, SignalEvent)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, instrument: &Instrument, event: &SignalEvent) -> Result<()> {
        self.tx
            .send((instrument.id.clone(), event.clone()))
            .await
            .map_err(|_| BotError::NotifyFailed {
                reason: format!("{}: event channel closed", instrument.id),
            })?;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Email sink
// ═══════════════════════════════════════════════════════════════════════════

/// Subject and plain-text body of one alert mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAlert {
    pub subject: String,
    pub body: String,
}

/// Render `event` for `instrument`. Prices are shown to two decimals.
pub fn render_email(instrument: &Instrument, event: &SignalEvent) -> EmailAlert {
    let name = instrument.id.as_str();
    let symbol = instrument.symbol.as_str();

    let (subject, lines) = match event {
        SignalEvent::Crossover(e) => (
            format!("{} SMMA{} crossover - {name}", e.direction.as_str().to_uppercase(), e.period),
            vec![
                format!("Price: {:.2}", e.price),
                format!("SMMA{}: {:.2}", e.period, e.indicator_value),
                format!("Time: {}", format_time(e.timestamp)),
            ],
        ),
        SignalEvent::Proximity(e) => (
            format!("Price near SMMA{} - {name}", e.period),
            vec![
                format!("Position: {}", e.direction.as_str()),
                format!("Price: {:.2}", e.price),
                format!("SMMA{}: {:.2}", e.period, e.indicator_value),
                format!("Time: {}", format_time(e.timestamp)),
            ],
        ),
        SignalEvent::Entry(e) => (
            format!("{} signal - {name}", e.side.as_str()),
            vec![
                format!("Entry: {:.2}", e.entry),
                format!("Stop Loss: {:.2}", e.stop_loss),
                format!("Target 1: {:.2}", e.target_1),
                format!("Target 2: {:.2}", e.target_2),
                format!("RSI: {:.2}", e.snapshot.rsi),
                format!(
                    "MACD: {}",
                    e.snapshot.macd_signal().map(|m| m.as_str()).unwrap_or("n/a")
                ),
                format!("Time: {}", format_time(e.timestamp)),
            ],
        ),
        SignalEvent::Exit(e) => (
            format!("EXIT {} ({}) - {name}", e.side.as_str(), e.reason.as_str()),
            vec![
                format!("Entry: {:.2}", e.entry),
                format!("Exit: {:.2}", e.exit),
                format!("P&L: {:.2} ({:.2}%)", e.pnl, e.pnl_percent),
                format!("Held: {}m", e.duration_seconds / 60),
                format!("Time: {}", format_time(e.timestamp)),
            ],
        ),
    };

    EmailAlert {
        subject,
        body: format!("{name} ({symbol})\n{}\n", lines.join("\n")),
    }
}

fn format_time(unix_seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix_seconds, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| unix_seconds.to_string())
}

/// Sends every event as a plain-text mail over STARTTLS.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    /// Build the SMTP transport. Reads the password from `config.password_env`.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let password = std::env::var(&config.password_env)
            .with_context(|| format!("{} env var not set", config.password_env))?;
        let from: Mailbox = config
            .sender()
            .parse()
            .with_context(|| format!("invalid sender address {:?}", config.sender()))?;
        let to: Mailbox = config
            .to
            .parse()
            .with_context(|| format!("invalid recipient address {:?}", config.to))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .with_context(|| format!("invalid SMTP host {:?}", config.smtp_host))?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.username.clone(), password))
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .build();

        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, instrument: &Instrument, event: &SignalEvent) -> Result<()> {
        let alert = render_email(instrument, event);
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(alert.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body)
            .context("failed to build alert mail")?;

        self.transport
            .send(message)
            .await
            .map_err(|e| BotError::NotifyFailed {
                reason: format!("{}: smtp: {e}", instrument.id),
            })?;

        info!(instrument = instrument.id.as_str(), subject = %alert.subject, "email sent");
        Ok(())
    }
}
