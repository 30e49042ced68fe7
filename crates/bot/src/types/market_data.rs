use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stable identifier of a monitored instrument (its display name, e.g. `Nifty50`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A monitored instrument: display identity plus the data-provider symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    /// Provider ticker, e.g. `^NSEI` or `RELIANCE.NS`.
    pub symbol: String,
}

impl Instrument {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            id: InstrumentId::new(name),
            symbol: symbol.into(),
        }
    }
}

/// A single OHLCV candle. `timestamp` is the candle open time in unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
}

impl Candle {
    /// Candle whose open/high/low all equal the close. Handy for close-only feeds.
    pub fn from_close(timestamp: i64, close: Decimal, volume: Decimal) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }
}

/// Extract the close column.
pub fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}

/// Extract the volume column.
pub fn volumes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.volume).collect()
}
