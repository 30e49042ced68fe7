//! Per-instrument signal engine.
//!
//! One [`InstrumentMonitor`] owns every piece of mutable state for a single
//! instrument: a crossover and a proximity detector per monitored SMMA period,
//! the trade state machine, the alert throttle and the last snapshot. Feature
//! toggles in [`EngineParams`] select which signals are produced, so the plain
//! crossover, proximity and MACD-confirmed configurations all run through the
//! same code path.
//!
//! Evaluation is synchronous and performs no I/O.

use rust_decimal::Decimal;

use crate::constants::{
    DEFAULT_ALERT_COOLDOWN_SECONDS, DEFAULT_MACD_FAST, DEFAULT_MACD_SIGNAL, DEFAULT_MACD_SLOW,
    DEFAULT_PROXIMITY_THRESHOLD, DEFAULT_RSI_PERIOD, DEFAULT_SMMA_FAST, DEFAULT_SMMA_SLOW,
    DEFAULT_VOLUME_WINDOW,
};
use crate::core::alert_throttle::{AlertKey, AlertScope, AlertThrottle};
use crate::core::crossover::{CrossoverDetector, ProximityDetector};
use crate::core::indicators::{self, MacdSeries};
use crate::core::macd_classifier;
use crate::core::trade_state::{EntryRules, TradeStateMachine};
use crate::types::{
    closes, volumes, Candle, CrossoverEvent, IndicatorSnapshot, Instrument, MacdReading,
    ProximityEvent, SignalEvent, SmmaLevel,
};

// ═══════════════════════════════════════════════════════════════════════════
// Parameters
// ═══════════════════════════════════════════════════════════════════════════

/// Everything the engine needs, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineParams {
    /// Periods watched for crossover and proximity alerts.
    pub smma_periods: Vec<usize>,
    /// Fast/slow pair driving the trade state machine.
    pub smma_fast: usize,
    pub smma_slow: usize,
    pub rsi_period: usize,
    /// Compute and classify MACD. Forced on when entries require it.
    pub use_macd: bool,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub volume_window: usize,
    /// Fraction of the indicator value (`0.005` = 0.5%).
    pub proximity_threshold: Decimal,
    pub detect_crossovers: bool,
    pub detect_proximity: bool,
    pub track_trades: bool,
    pub entry: EntryRules,
    pub alert_cooldown_seconds: i64,
    pub alert_scope: AlertScope,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            smma_periods: vec![DEFAULT_SMMA_FAST, DEFAULT_SMMA_SLOW],
            smma_fast: DEFAULT_SMMA_FAST,
            smma_slow: DEFAULT_SMMA_SLOW,
            rsi_period: DEFAULT_RSI_PERIOD,
            use_macd: true,
            macd_fast: DEFAULT_MACD_FAST,
            macd_slow: DEFAULT_MACD_SLOW,
            macd_signal: DEFAULT_MACD_SIGNAL,
            volume_window: DEFAULT_VOLUME_WINDOW,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            detect_crossovers: true,
            detect_proximity: true,
            track_trades: true,
            entry: EntryRules::default(),
            alert_cooldown_seconds: DEFAULT_ALERT_COOLDOWN_SECONDS,
            alert_scope: AlertScope::PerSignal,
        }
    }
}

impl EngineParams {
    pub fn macd_enabled(&self) -> bool {
        self.use_macd || self.entry.require_macd
    }

    /// Candles needed before every enabled indicator is defined.
    pub fn required_lookback(&self) -> usize {
        let smma = self
            .smma_periods
            .iter()
            .copied()
            .chain([self.smma_fast, self.smma_slow])
            .max()
            .unwrap_or(0);
        let mut need = smma.max(self.rsi_period + 1);
        if self.macd_enabled() {
            need = need.max(self.macd_slow + self.macd_signal);
        }
        need
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════════════════════

/// Derive the indicator snapshot at the last candle.
///
/// `None` when any enabled indicator is not yet computable.
pub fn build_snapshot(candles: &[Candle], params: &EngineParams) -> Option<IndicatorSnapshot> {
    let last = candles.last()?;
    let closes = closes(candles);
    let volumes = volumes(candles);

    let last_smma = |period: usize| -> Option<Decimal> {
        indicators::smma(&closes, period)?.last().copied()
    };

    let smma_fast = last_smma(params.smma_fast)?;
    let smma_slow = last_smma(params.smma_slow)?;
    let smma_levels = params
        .smma_periods
        .iter()
        .map(|&period| last_smma(period).map(|value| SmmaLevel { period, value }))
        .collect::<Option<Vec<_>>>()?;

    let rsi = *indicators::rsi(&closes, params.rsi_period)?.last()?;
    let volume_avg = indicators::volume_average(&volumes, params.volume_window)?;

    let macd = if params.macd_enabled() {
        let series = indicators::macd(
            &closes,
            params.macd_fast,
            params.macd_slow,
            params.macd_signal,
        )?;
        Some(macd_reading(&series)?)
    } else {
        None
    };

    Some(IndicatorSnapshot {
        timestamp: last.timestamp,
        price: last.close,
        smma_fast,
        smma_slow,
        rsi,
        volume: last.volume,
        volume_avg,
        macd,
        smma_levels,
    })
}

fn macd_reading(series: &MacdSeries) -> Option<MacdReading> {
    let (macd, signal, histogram) = series.last()?;
    Some(MacdReading {
        macd,
        signal,
        histogram,
        classification: macd_classifier::classify(macd, signal, series.previous()),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Monitor
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientData { have: usize, need: usize },
    /// The newest candle was already evaluated.
    StaleCandle { timestamp: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Skipped(SkipReason),
    Evaluated {
        snapshot: IndicatorSnapshot,
        events: Vec<SignalEvent>,
        /// Alerts dropped by the cooldown.
        suppressed: usize,
    },
}

#[derive(Debug, Clone)]
struct PeriodTracker {
    period: usize,
    crossover: CrossoverDetector,
    proximity: ProximityDetector,
}

/// All signal state for one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentMonitor {
    instrument: Instrument,
    params: EngineParams,
    trackers: Vec<PeriodTracker>,
    trades: TradeStateMachine,
    throttle: AlertThrottle,
    previous: Option<IndicatorSnapshot>,
    last_evaluated: Option<i64>,
}

impl InstrumentMonitor {
    pub fn new(instrument: Instrument, params: EngineParams) -> Self {
        let trackers = params
            .smma_periods
            .iter()
            .map(|&period| PeriodTracker {
                period,
                crossover: CrossoverDetector::new(),
                proximity: ProximityDetector::new(params.proximity_threshold),
            })
            .collect();
        let trades = TradeStateMachine::new(instrument.id.clone(), params.entry.clone());
        let throttle = AlertThrottle::new(params.alert_cooldown_seconds);

        Self {
            instrument,
            params,
            trackers,
            trades,
            throttle,
            previous: None,
            last_evaluated: None,
        }
    }

    /// One monitor per instrument, all sharing `params`.
    pub fn build_all(instruments: &[Instrument], params: &EngineParams) -> Vec<Self> {
        instruments
            .iter()
            .map(|i| Self::new(i.clone(), params.clone()))
            .collect()
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn trades(&self) -> &TradeStateMachine {
        &self.trades
    }

    pub fn trades_mut(&mut self) -> &mut TradeStateMachine {
        &mut self.trades
    }

    pub fn last_snapshot(&self) -> Option<&IndicatorSnapshot> {
        self.previous.as_ref()
    }

    /// Process a closed-candle series and return the events it produced.
    ///
    /// `now` (unix seconds) only drives the alert cooldown.
    pub fn evaluate(&mut self, candles: &[Candle], now: i64) -> Evaluation {
        let need = self.params.required_lookback();
        let have = candles.len();
        if have < need {
            return Evaluation::Skipped(SkipReason::InsufficientData { have, need });
        }

        let Some(snapshot) = build_snapshot(candles, &self.params) else {
            return Evaluation::Skipped(SkipReason::InsufficientData { have, need });
        };

        if self.last_evaluated.is_some_and(|ts| snapshot.timestamp <= ts) {
            return Evaluation::Skipped(SkipReason::StaleCandle {
                timestamp: snapshot.timestamp,
            });
        }

        let alerts = self.detect_alerts(&snapshot);
        let alert_count = alerts.len();
        let mut events = self.throttle_alerts(alerts, now);
        let suppressed = alert_count - events.len();

        if self.params.track_trades {
            if let Some(previous) = &self.previous {
                if let Some(event) = self.trades.evaluate(&snapshot, previous) {
                    events.push(event.into());
                }
            }
        }

        self.last_evaluated = Some(snapshot.timestamp);
        self.previous = Some(snapshot.clone());

        Evaluation::Evaluated {
            snapshot,
            events,
            suppressed,
        }
    }

    fn detect_alerts(&mut self, snapshot: &IndicatorSnapshot) -> Vec<SignalEvent> {
        let mut alerts = Vec::new();
        let price = snapshot.price;

        for tracker in &mut self.trackers {
            let Some(value) = snapshot.smma(tracker.period) else {
                continue;
            };

            if self.params.detect_crossovers {
                if let Some(direction) = tracker.crossover.detect(price, value) {
                    alerts.push(SignalEvent::Crossover(CrossoverEvent {
                        instrument: self.instrument.id.clone(),
                        period: tracker.period,
                        direction,
                        price,
                        indicator_value: value,
                        timestamp: snapshot.timestamp,
                    }));
                }
            }

            if self.params.detect_proximity {
                if let Some(direction) = tracker.proximity.detect(price, value) {
                    alerts.push(SignalEvent::Proximity(ProximityEvent {
                        instrument: self.instrument.id.clone(),
                        period: tracker.period,
                        direction,
                        price,
                        indicator_value: value,
                        timestamp: snapshot.timestamp,
                    }));
                }
            }
        }

        alerts
    }

    fn throttle_alerts(&mut self, alerts: Vec<SignalEvent>, now: i64) -> Vec<SignalEvent> {
        match self.params.alert_scope {
            AlertScope::PerSignal => alerts
                .into_iter()
                .filter(|event| match AlertKey::for_event(event) {
                    Some(key) => self.throttle.should_fire(&key, now),
                    None => true,
                })
                .collect(),
            AlertScope::PerInstrument => {
                if alerts.is_empty() {
                    return alerts;
                }
                let key = AlertKey::instrument_wide(&self.instrument.id);
                if self.throttle.should_fire(&key, now) {
                    alerts
                } else {
                    Vec::new()
                }
            }
        }
    }
}
