//! Periodic scan over every monitored instrument.
//!
//! Each cycle fetches candles for all instruments with bounded concurrency,
//! trims a still-forming last candle, validates the series, runs the
//! instrument's monitor and hands the resulting events to the notifier.
//! Closed trades are recorded in the session P&L ledger.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::core::data_quality::{self, MarketHours};
use crate::core::data_service::CandleSource;
use crate::core::monitor::{Evaluation, InstrumentMonitor, SkipReason};
use crate::core::notifier::Notifier;
use crate::core::pnl_tracker::PnLTracker;
use crate::errors::BotError;
use crate::types::SignalEvent;

/// Scheduling knobs for [`Scanner`].
#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub max_workers: usize,
    pub poll_interval: Duration,
    pub market_closed_sleep: Duration,
    /// Candle length in seconds, used to recognise a forming candle.
    pub interval_seconds: i64,
    pub min_candles: usize,
    /// `None` scans around the clock.
    pub market_hours: Option<MarketHours>,
}

impl ScannerSettings {
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let interval = &config.data_source.interval;
        let interval_seconds = data_quality::parse_interval_seconds(interval)
            .ok_or_else(|| BotError::Config(format!("unsupported candle interval: {interval}")))?;

        Ok(Self {
            max_workers: config.max_workers,
            poll_interval: Duration::from_secs(config.poll_interval_seconds),
            market_closed_sleep: Duration::from_secs(config.market_closed_sleep_seconds),
            interval_seconds,
            min_candles: config.min_candles,
            market_hours: config.market_hours().context("invalid market hours")?,
        })
    }
}

/// Counters for one scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Events produced by the monitors.
    pub events: usize,
    /// Events the notifier failed to deliver.
    pub undelivered: usize,
    /// Alerts held back by the cooldown.
    pub suppressed: usize,
    /// Set when the cycle was skipped outside trading hours.
    pub market_closed: bool,
}

#[derive(Debug)]
enum Outcome {
    Evaluated {
        events: usize,
        undelivered: usize,
        suppressed: usize,
    },
    Skipped,
    Failed,
}

pub struct Scanner<S: CandleSource> {
    monitors: Vec<InstrumentMonitor>,
    source: S,
    notifier: Arc<dyn Notifier>,
    pnl: Arc<PnLTracker>,
    settings: ScannerSettings,
}

impl<S: CandleSource> Scanner<S> {
    pub fn new(
        monitors: Vec<InstrumentMonitor>,
        source: S,
        notifier: Arc<dyn Notifier>,
        pnl: Arc<PnLTracker>,
        settings: ScannerSettings,
    ) -> Self {
        Self {
            monitors,
            source,
            notifier,
            pnl,
            settings,
        }
    }

    pub fn monitors(&self) -> &[InstrumentMonitor] {
        &self.monitors
    }

    pub fn pnl(&self) -> &Arc<PnLTracker> {
        &self.pnl
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------

    /// Scan until `shutdown` is cancelled.
    ///
    /// Outside market hours the loop waits `market_closed_sleep` instead of
    /// the poll interval.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        info!(
            source = self.source.name(),
            instruments = self.monitors.len(),
            max_workers = self.settings.max_workers,
            poll_s = self.settings.poll_interval.as_secs(),
            "scanner started"
        );

        loop {
            let summary = self.scan_once(Utc::now().timestamp()).await;

            let wait = if summary.market_closed {
                info!(
                    sleep_s = self.settings.market_closed_sleep.as_secs(),
                    "market closed, waiting"
                );
                self.settings.market_closed_sleep
            } else {
                info!(
                    evaluated = summary.evaluated,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    events = summary.events,
                    undelivered = summary.undelivered,
                    suppressed = summary.suppressed,
                    "scan complete"
                );
                self.settings.poll_interval
            };

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scanner shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Ok(())
    }

    /// Run one cycle over every instrument at unix time `now`.
    pub async fn scan_once(&mut self, now: i64) -> ScanSummary {
        let Self {
            monitors,
            source,
            notifier,
            pnl,
            settings,
        } = self;

        if let Some(hours) = &settings.market_hours {
            if !hours.is_open_at(now) {
                return ScanSummary {
                    market_closed: true,
                    ..ScanSummary::default()
                };
            }
        }

        let source: &S = source;
        let notifier: &dyn Notifier = &**notifier;
        let pnl: &PnLTracker = pnl;
        let settings: &ScannerSettings = settings;

        let outcomes: Vec<Outcome> = stream::iter(monitors.iter_mut())
            .map(|monitor| scan_instrument(monitor, source, notifier, pnl, settings, now))
            .buffer_unordered(settings.max_workers.max(1))
            .collect()
            .await;

        outcomes
            .into_iter()
            .fold(ScanSummary::default(), |mut summary, outcome| {
                match outcome {
                    Outcome::Evaluated {
                        events,
                        undelivered,
                        suppressed,
                    } => {
                        summary.evaluated += 1;
                        summary.events += events;
                        summary.undelivered += undelivered;
                        summary.suppressed += suppressed;
                    }
                    Outcome::Skipped => summary.skipped += 1,
                    Outcome::Failed => summary.failed += 1,
                }
                summary
            })
    }
}

// ---------------------------------------------------------------------------
// Per-instrument pipeline
// ---------------------------------------------------------------------------

async fn scan_instrument<S: CandleSource>(
    monitor: &mut InstrumentMonitor,
    source: &S,
    notifier: &dyn Notifier,
    pnl: &PnLTracker,
    settings: &ScannerSettings,
    now: i64,
) -> Outcome {
    let instrument = monitor.instrument().clone();
    let name = instrument.id.as_str();

    let candles = match source.fetch_candles(&instrument).await {
        Ok(c) => c,
        Err(e) => {
            let err = format!("{e:#}");
            warn!(instrument = name, symbol = %instrument.symbol, error = %err, "failed to fetch candles");
            return Outcome::Failed;
        }
    };

    let closed = data_quality::drop_incomplete(&candles, settings.interval_seconds, now);
    if closed.len() < candles.len() {
        debug!(instrument = name, "dropped forming candle");
    }

    match data_quality::validate_series(closed, settings.min_candles) {
        Ok(()) => {}
        Err(BotError::InsufficientCandles { have, need }) => {
            debug!(instrument = name, have, need, "not enough candles yet");
            return Outcome::Skipped;
        }
        Err(e) => {
            warn!(instrument = name, error = %e, "rejected candle series");
            return Outcome::Failed;
        }
    }

    let (snapshot, events, suppressed) = match monitor.evaluate(closed, now) {
        Evaluation::Evaluated {
            snapshot,
            events,
            suppressed,
        } => (snapshot, events, suppressed),
        Evaluation::Skipped(SkipReason::StaleCandle { timestamp }) => {
            debug!(instrument = name, timestamp, "no new closed candle");
            return Outcome::Skipped;
        }
        Evaluation::Skipped(SkipReason::InsufficientData { have, need }) => {
            debug!(instrument = name, have, need, "indicators not ready");
            return Outcome::Skipped;
        }
    };

    debug!(
        instrument = name,
        price = %snapshot.price,
        smma_fast = %snapshot.smma_fast,
        smma_slow = %snapshot.smma_slow,
        rsi = %snapshot.rsi,
        events = events.len(),
        suppressed,
        "evaluated"
    );

    let mut undelivered = 0;
    for event in &events {
        if let SignalEvent::Exit(exit) = event {
            pnl.record_close(exit);
        }
        if let Err(e) = notifier.notify(&instrument, event).await {
            let err = format!("{e:#}");
            warn!(instrument = name, kind = event.kind(), error = %err, "failed to deliver event");
            undelivered += 1;
        }
    }

    Outcome::Evaluated {
        events: events.len(),
        undelivered,
        suppressed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    use crate::core::monitor::EngineParams;
    use crate::core::notifier::ChannelNotifier;
    use crate::types::{Candle, ExitReason, Instrument, InstrumentId};

    const INTERVAL: i64 = 900;

    const SETUP: [&str; 14] = [
        "100", "101", "102", "103", "104", "105", "106", "107", "106", "105", "104", "103",
        "104", "104.5",
    ];

    /// Serves whatever series was last stored for a symbol.
    #[derive(Default)]
    struct FixedSource {
        series: Mutex<HashMap<String, Vec<Candle>>>,
    }

    impl FixedSource {
        fn set(&self, symbol: &str, closes: &[&str]) {
            let n = closes.len();
            let candles = closes
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    // Volume spike on the newest candle.
                    let volume = if i + 1 == n { dec!(2000) } else { dec!(1000) };
                    Candle::from_close(i as i64 * INTERVAL, c.parse::<Decimal>().unwrap(), volume)
                })
                .collect();
            self.series.lock().unwrap().insert(symbol.to_string(), candles);
        }
    }

    #[async_trait]
    impl CandleSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch_candles(&self, instrument: &Instrument) -> Result<Vec<Candle>> {
            self.series
                .lock()
                .unwrap()
                .get(&instrument.symbol)
                .cloned()
                .ok_or_else(|| {
                    BotError::DataUnavailable {
                        name: instrument.symbol.clone(),
                    }
                    .into()
                })
        }
    }

    fn params() -> EngineParams {
        EngineParams {
            smma_periods: vec![3, 5],
            smma_fast: 3,
            smma_slow: 5,
            rsi_period: 3,
            use_macd: false,
            volume_window: 5,
            detect_crossovers: false,
            detect_proximity: false,
            ..EngineParams::default()
        }
    }

    fn settings() -> ScannerSettings {
        ScannerSettings {
            max_workers: 2,
            poll_interval: Duration::from_secs(3600),
            market_closed_sleep: Duration::from_secs(3600),
            interval_seconds: INTERVAL,
            min_candles: 5,
            market_hours: None,
        }
    }

    fn scanner(
        instruments: &[Instrument],
        source: FixedSource,
    ) -> (Scanner<FixedSource>, mpsc::Receiver<(InstrumentId, SignalEvent)>) {
        let (notifier, rx) = ChannelNotifier::channel(64);
        let monitors = InstrumentMonitor::build_all(instruments, &params());
        let scanner = Scanner::new(
            monitors,
            source,
            Arc::new(notifier),
            Arc::new(PnLTracker::new()),
            settings(),
        );
        (scanner, rx)
    }

    fn nifty() -> Instrument {
        Instrument::new("Nifty50", "^NSEI")
    }

    // -- Lifecycle ------------------------------------------------------------

    #[tokio::test]
    async fn test_entry_and_exit_reach_notifier_and_ledger() {
        let source = FixedSource::default();
        source.set("^NSEI", &SETUP[..13]);
        let (mut scanner, mut rx) = scanner(&[nifty()], source);

        let first = scanner.scan_once(13 * INTERVAL).await;
        assert_eq!(first.evaluated, 1);
        assert_eq!(first.events, 0);

        scanner.source.set("^NSEI", &SETUP);
        let second = scanner.scan_once(14 * INTERVAL).await;
        assert_eq!(second.events, 1);
        let (id, event) = rx.recv().await.unwrap();
        assert_eq!(id.as_str(), "Nifty50");
        assert!(matches!(event, SignalEvent::Entry(_)));

        let mut closes = SETUP.to_vec();
        closes.push("105.5");
        scanner.source.set("^NSEI", &closes);
        let third = scanner.scan_once(15 * INTERVAL).await;
        assert_eq!(third.events, 1);
        match rx.recv().await.unwrap().1 {
            SignalEvent::Exit(x) => assert_eq!(x.reason, ExitReason::Target2),
            other => panic!("expected exit, got {other:?}"),
        }

        let stats = scanner.pnl().stats();
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.total_pnl, dec!(1));
    }

    #[tokio::test]
    async fn test_forming_candle_is_dropped() {
        let source = FixedSource::default();
        let mut closes = SETUP.to_vec();
        closes.push("110");
        source.set("^NSEI", &closes);
        let (mut scanner, _rx) = scanner(&[nifty()], source);

        // The 15th candle opened 100s ago.
        scanner.scan_once(14 * INTERVAL + 100).await;
        let snap = scanner.monitors()[0].last_snapshot().unwrap();
        assert_eq!(snap.price, dec!(104.5));
        assert_eq!(snap.timestamp, 13 * INTERVAL);
    }

    #[tokio::test]
    async fn test_same_candle_is_skipped_next_cycle() {
        let source = FixedSource::default();
        source.set("^NSEI", &SETUP);
        let (mut scanner, _rx) = scanner(&[nifty()], source);

        assert_eq!(scanner.scan_once(14 * INTERVAL).await.evaluated, 1);
        let again = scanner.scan_once(14 * INTERVAL + 60).await;
        assert_eq!(again.evaluated, 0);
        assert_eq!(again.skipped, 1);
    }

    // -- Failures -------------------------------------------------------------

    #[tokio::test]
    async fn test_one_failure_does_not_stop_others() {
        let source = FixedSource::default();
        source.set("^NSEI", &SETUP);
        let instruments = [nifty(), Instrument::new("Sensex", "^BSESN")];
        let (mut scanner, _rx) = scanner(&instruments, source);

        let summary = scanner.scan_once(14 * INTERVAL).await;
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_counted() {
        let source = FixedSource::default();
        source.set("^NSEI", &SETUP[..13]);
        let (mut scanner, rx) = scanner(&[nifty()], source);
        drop(rx);

        scanner.scan_once(13 * INTERVAL).await;
        scanner.source.set("^NSEI", &SETUP);
        let summary = scanner.scan_once(14 * INTERVAL).await;
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.undelivered, 1);
        assert!(scanner.monitors()[0].trades().position().is_some());
    }

    #[tokio::test]
    async fn test_short_series_is_skipped() {
        let source = FixedSource::default();
        source.set("^NSEI", &SETUP[..3]);
        let (mut scanner, _rx) = scanner(&[nifty()], source);

        let summary = scanner.scan_once(3 * INTERVAL).await;
        assert_eq!(summary.skipped, 1);
        assert!(scanner.monitors()[0].last_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_market_closed_skips_fetch() {
        let source = FixedSource::default();
        source.set("^NSEI", &SETUP);
        let (mut scanner, _rx) = scanner(&[nifty()], source);
        scanner.settings.market_hours = Some(MarketHours::nse());

        // 2024-03-09 is a Saturday.
        let saturday = 1_709_971_200;
        let summary = scanner.scan_once(saturday).await;
        assert!(summary.market_closed);
        assert_eq!(summary.evaluated, 0);
        assert!(scanner.monitors()[0].last_snapshot().is_none());
    }

    // -- Loop -----------------------------------------------------------------

    #[tokio::test]
    async fn test_run_returns_on_cancel() {
        let (mut scanner, _rx) = scanner(&[nifty()], FixedSource::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        assert!(scanner.run(shutdown).await.is_ok());
    }
}
