use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market_data::InstrumentId;
use super::position::{ExitReason, TradeSide};

/// Which way the indicator moved relative to price.
///
/// `Bullish` means the indicator rose from at-or-below price to above it;
/// `Bearish` is the mirror. The indicator is the moving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossDirection {
    Bullish,
    Bearish,
}

impl CrossDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
        }
    }
}

/// Side of the indicator the price sits on while inside the proximity band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityDirection {
    NearAbove,
    NearBelow,
}

impl ProximityDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearAbove => "near_above",
            Self::NearBelow => "near_below",
        }
    }
}

/// MACD / signal-line relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdSignal {
    Bullish,
    Bearish,
    Neutral,
    BullishCrossover,
    BearishCrossover,
}

impl MacdSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
            Self::BullishCrossover => "bullish_crossover",
            Self::BearishCrossover => "bearish_crossover",
        }
    }

    /// `Bullish` or `BullishCrossover`.
    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::Bullish | Self::BullishCrossover)
    }

    /// `Bearish` or `BearishCrossover`.
    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::Bearish | Self::BearishCrossover)
    }
}

/// Latest MACD triple with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    #[serde(with = "rust_decimal::serde::str")]
    pub macd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub signal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub histogram: Decimal,
    pub classification: MacdSignal,
}

/// Latest value of one monitored SMMA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmmaLevel {
    pub period: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
}

/// Indicator values derived from one candle series, taken at its last candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Open time of the candle the snapshot was taken at.
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub smma_fast: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub smma_slow: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rsi: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume_avg: Decimal,
    /// Absent when the MACD lookback is not met or MACD is not used.
    pub macd: Option<MacdReading>,
    /// Every monitored SMMA period, in configuration order.
    pub smma_levels: Vec<SmmaLevel>,
}

impl IndicatorSnapshot {
    pub fn macd_signal(&self) -> Option<MacdSignal> {
        self.macd.as_ref().map(|m| m.classification)
    }

    pub fn smma(&self, period: usize) -> Option<Decimal> {
        self.smma_levels
            .iter()
            .find(|l| l.period == period)
            .map(|l| l.value)
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    pub instrument: InstrumentId,
    pub period: usize,
    pub direction: CrossDirection,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub indicator_value: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityEvent {
    pub instrument: InstrumentId,
    pub period: usize,
    pub direction: ProximityDirection,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub indicator_value: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEvent {
    pub instrument: InstrumentId,
    pub side: TradeSide,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_1: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_2: Decimal,
    pub timestamp: i64,
    pub snapshot: IndicatorSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitEvent {
    pub instrument: InstrumentId,
    pub side: TradeSide,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub exit: Decimal,
    pub reason: ExitReason,
    #[serde(with = "rust_decimal::serde::str")]
    pub pnl: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub pnl_percent: Decimal,
    /// Seconds between the entry candle and the exit candle.
    pub duration_seconds: i64,
    pub timestamp: i64,
}

/// Anything the monitor asks the notifier to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalEvent {
    Crossover(CrossoverEvent),
    Proximity(ProximityEvent),
    Entry(EntryEvent),
    Exit(ExitEvent),
}

impl SignalEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Crossover(_) => "crossover",
            Self::Proximity(_) => "proximity",
            Self::Entry(_) => "entry",
            Self::Exit(_) => "exit",
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        match self {
            Self::Crossover(e) => &e.instrument,
            Self::Proximity(e) => &e.instrument,
            Self::Entry(e) => &e.instrument,
            Self::Exit(e) => &e.instrument,
        }
    }

    /// Crossover and proximity events are alerts subject to throttling;
    /// entries and exits are trade transitions.
    pub fn is_alert(&self) -> bool {
        matches!(self, Self::Crossover(_) | Self::Proximity(_))
    }
}
