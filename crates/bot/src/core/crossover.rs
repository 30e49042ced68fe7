//! Price vs. indicator transition detection.
//!
//! Each detector instance tracks exactly one (instrument, period) pair and is
//! owned by that instrument's monitor, so the instance itself is the key.

use rust_decimal::Decimal;

use crate::types::{CrossDirection, ProximityDirection};

// ═══════════════════════════════════════════════════════════════════════════
// Crossover
// ═══════════════════════════════════════════════════════════════════════════

/// Last observed (price, indicator) pair. `armed` flips on the first observation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CrossoverState {
    pub last_price: Decimal,
    pub last_indicator_value: Decimal,
    pub armed: bool,
}

/// Detects the indicator crossing the price between consecutive observations.
///
/// The indicator is the moving side: bullish means the indicator went from at
/// or below price to above it, bearish the mirror. The stored pair is replaced
/// after every call whether or not an event fired.
#[derive(Debug, Clone, Default)]
pub struct CrossoverDetector {
    state: CrossoverState,
}

impl CrossoverDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CrossoverState {
        &self.state
    }

    /// Compare against the previous observation, then record this one.
    ///
    /// The first observation only arms the detector and never emits.
    pub fn detect(&mut self, price: Decimal, indicator: Decimal) -> Option<CrossDirection> {
        let previous = self.state;
        self.state = CrossoverState {
            last_price: price,
            last_indicator_value: indicator,
            armed: true,
        };

        if !previous.armed {
            return None;
        }

        let (prev_price, prev_indicator) = (previous.last_price, previous.last_indicator_value);

        if prev_indicator <= prev_price && indicator > price {
            Some(CrossDirection::Bullish)
        } else if prev_indicator >= prev_price && indicator < price {
            Some(CrossDirection::Bearish)
        } else {
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Proximity
// ═══════════════════════════════════════════════════════════════════════════

/// Latched band test: fires once per entry into `|price - ind| / ind <= threshold`.
#[derive(Debug, Clone)]
pub struct ProximityDetector {
    threshold: Decimal,
    alerted: bool,
}

impl ProximityDetector {
    /// `threshold` is a fraction of the indicator value (`0.005` = 0.5%).
    pub fn new(threshold: Decimal) -> Self {
        Self {
            threshold,
            alerted: false,
        }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    /// `true` while a band dwell has already been reported.
    pub fn is_alerted(&self) -> bool {
        self.alerted
    }

    /// Fraction of the indicator value separating price from it.
    ///
    /// `None` when the indicator is zero.
    pub fn distance(price: Decimal, indicator: Decimal) -> Option<Decimal> {
        (price - indicator).abs().checked_div(indicator.abs())
    }

    pub fn detect(&mut self, price: Decimal, indicator: Decimal) -> Option<ProximityDirection> {
        let near = Self::distance(price, indicator).is_some_and(|d| d <= self.threshold);

        if !near {
            self.alerted = false;
            return None;
        }
        if self.alerted {
            return None;
        }

        self.alerted = true;
        if price > indicator {
            Some(ProximityDirection::NearAbove)
        } else {
            Some(ProximityDirection::NearBelow)
        }
    }
}
