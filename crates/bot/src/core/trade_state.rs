//! Per-instrument trade lifecycle: FLAT -> OPEN -> FLAT.
//!
//! Entry needs a fast-SMMA cross and the trend filter, plus whichever of the
//! RSI band, volume and MACD confirmations [`EntryRules`] enables. Exits are
//! checked in a fixed order: stop-loss, target 2, target 1, trend reversal.
//! The first match closes the position.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LONG_RSI_LOWER, DEFAULT_LONG_RSI_UPPER, DEFAULT_SHORT_RSI_LOWER,
    DEFAULT_SHORT_RSI_UPPER, DEFAULT_TARGET_1_MULTIPLE, DEFAULT_TARGET_2_MULTIPLE,
    DEFAULT_VOLUME_MULTIPLIER,
};
use crate::core::indicators::is_volume_high;
use crate::types::{
    EntryEvent, ExitEvent, ExitReason, IndicatorSnapshot, InstrumentId, MacdSignal, Position,
    SignalEvent, TradeSide,
};

// ═══════════════════════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════════════════════

/// Open RSI interval: both bounds exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsiBand {
    #[serde(with = "rust_decimal::serde::str")]
    pub lower: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub upper: Decimal,
}

impl RsiBand {
    pub fn new(lower: Decimal, upper: Decimal) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, rsi: Decimal) -> bool {
        rsi > self.lower && rsi < self.upper
    }
}

/// Which confirmations gate an entry, and how the targets are placed.
///
/// The fast-SMMA cross and the fast/slow trend filter are always required.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRules {
    pub long_rsi: RsiBand,
    pub short_rsi: RsiBand,
    pub require_rsi_band: bool,
    pub require_volume: bool,
    pub volume_multiplier: Decimal,
    /// Also gates the trend-reversal exit on the opposing MACD crossover.
    pub require_macd: bool,
    pub target_1_multiple: Decimal,
    pub target_2_multiple: Decimal,
}

impl Default for EntryRules {
    fn default() -> Self {
        Self {
            long_rsi: RsiBand::new(DEFAULT_LONG_RSI_LOWER, DEFAULT_LONG_RSI_UPPER),
            short_rsi: RsiBand::new(DEFAULT_SHORT_RSI_LOWER, DEFAULT_SHORT_RSI_UPPER),
            require_rsi_band: true,
            require_volume: true,
            volume_multiplier: DEFAULT_VOLUME_MULTIPLIER,
            require_macd: false,
            target_1_multiple: DEFAULT_TARGET_1_MULTIPLE,
            target_2_multiple: DEFAULT_TARGET_2_MULTIPLE,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// State machine
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Flat,
    Open,
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    Entry(EntryEvent),
    Exit(ExitEvent),
}

impl From<TradeEvent> for SignalEvent {
    fn from(event: TradeEvent) -> Self {
        match event {
            TradeEvent::Entry(e) => SignalEvent::Entry(e),
            TradeEvent::Exit(e) => SignalEvent::Exit(e),
        }
    }
}

/// Holds at most one position for one instrument.
#[derive(Debug, Clone)]
pub struct TradeStateMachine {
    instrument: InstrumentId,
    rules: EntryRules,
    position: Option<Position>,
}

impl TradeStateMachine {
    pub fn new(instrument: InstrumentId, rules: EntryRules) -> Self {
        Self {
            instrument,
            rules,
            position: None,
        }
    }

    pub fn state(&self) -> TradeState {
        if self.position.is_some() {
            TradeState::Open
        } else {
            TradeState::Flat
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn rules(&self) -> &EntryRules {
        &self.rules
    }

    /// Install a position directly. Returns `false` (and changes nothing)
    /// if one is already open.
    pub fn open_position(&mut self, position: Position) -> bool {
        if self.position.is_some() {
            return false;
        }
        self.position = Some(position);
        true
    }

    /// Run one transition step for a new snapshot.
    ///
    /// FLAT evaluates entry against `previous`; OPEN evaluates exits on
    /// `current` only. A step never both exits and re-enters.
    pub fn evaluate(
        &mut self,
        current: &IndicatorSnapshot,
        previous: &IndicatorSnapshot,
    ) -> Option<TradeEvent> {
        if self.position.is_none() {
            return self.try_enter(current, previous).map(TradeEvent::Entry);
        }

        let reason = self
            .position
            .as_ref()
            .and_then(|position| self.exit_reason(position, current))?;
        self.close(current, reason).map(TradeEvent::Exit)
    }

    // -- Entry --------------------------------------------------------------

    fn try_enter(
        &mut self,
        current: &IndicatorSnapshot,
        previous: &IndicatorSnapshot,
    ) -> Option<EntryEvent> {
        let side = self.entry_side(current, previous)?;
        let entry = current.price;
        let stop_loss = current.smma_slow;

        let (risk, target_1, target_2) = match side {
            TradeSide::Buy => {
                let risk = entry - stop_loss;
                (
                    risk,
                    entry + risk * self.rules.target_1_multiple,
                    entry + risk * self.rules.target_2_multiple,
                )
            }
            TradeSide::Sell => {
                let risk = stop_loss - entry;
                (
                    risk,
                    entry - risk * self.rules.target_1_multiple,
                    entry - risk * self.rules.target_2_multiple,
                )
            }
        };

        // Cross + trend filter put the slow SMMA behind price.
        if risk <= Decimal::ZERO {
            return None;
        }

        self.position = Some(Position {
            side,
            entry_price: entry,
            stop_loss,
            target_1,
            target_2,
            entry_timestamp: current.timestamp,
            snapshot: Some(current.clone()),
        });

        Some(EntryEvent {
            instrument: self.instrument.clone(),
            side,
            entry,
            stop_loss,
            target_1,
            target_2,
            timestamp: current.timestamp,
            snapshot: current.clone(),
        })
    }

    /// Long is checked before short.
    fn entry_side(
        &self,
        current: &IndicatorSnapshot,
        previous: &IndicatorSnapshot,
    ) -> Option<TradeSide> {
        let crossed_up = previous.price <= previous.smma_fast && current.price > current.smma_fast;
        let crossed_down =
            previous.price >= previous.smma_fast && current.price < current.smma_fast;

        if crossed_up
            && current.smma_fast > current.smma_slow
            && self.confirmed(TradeSide::Buy, current)
        {
            return Some(TradeSide::Buy);
        }
        if crossed_down
            && current.smma_fast < current.smma_slow
            && self.confirmed(TradeSide::Sell, current)
        {
            return Some(TradeSide::Sell);
        }
        None
    }

    fn confirmed(&self, side: TradeSide, snap: &IndicatorSnapshot) -> bool {
        let rules = &self.rules;

        if rules.require_rsi_band {
            let band = match side {
                TradeSide::Buy => rules.long_rsi,
                TradeSide::Sell => rules.short_rsi,
            };
            if !band.contains(snap.rsi) {
                return false;
            }
        }

        if rules.require_volume
            && !is_volume_high(snap.volume, snap.volume_avg, rules.volume_multiplier)
        {
            return false;
        }

        if rules.require_macd {
            let agrees = match (side, snap.macd_signal()) {
                (TradeSide::Buy, Some(sig)) => sig.is_bullish(),
                (TradeSide::Sell, Some(sig)) => sig.is_bearish(),
                (_, None) => false,
            };
            if !agrees {
                return false;
            }
        }

        true
    }

    // -- Exit ---------------------------------------------------------------

    fn exit_reason(&self, position: &Position, snap: &IndicatorSnapshot) -> Option<ExitReason> {
        let price = snap.price;
        let macd = snap.macd_signal();

        match position.side {
            TradeSide::Buy => {
                if price <= position.stop_loss {
                    Some(ExitReason::StopLoss)
                } else if price >= position.target_2 {
                    Some(ExitReason::Target2)
                } else if price >= position.target_1 {
                    Some(ExitReason::Target1)
                } else if price < snap.smma_fast
                    && snap.rsi < self.rules.long_rsi.lower
                    && self.reversal_confirmed(macd, MacdSignal::BearishCrossover)
                {
                    Some(ExitReason::TrendReversal)
                } else {
                    None
                }
            }
            TradeSide::Sell => {
                if price >= position.stop_loss {
                    Some(ExitReason::StopLoss)
                } else if price <= position.target_2 {
                    Some(ExitReason::Target2)
                } else if price <= position.target_1 {
                    Some(ExitReason::Target1)
                } else if price > snap.smma_fast
                    && snap.rsi > self.rules.short_rsi.upper
                    && self.reversal_confirmed(macd, MacdSignal::BullishCrossover)
                {
                    Some(ExitReason::TrendReversal)
                } else {
                    None
                }
            }
        }
    }

    fn reversal_confirmed(&self, macd: Option<MacdSignal>, needed: MacdSignal) -> bool {
        !self.rules.require_macd || macd == Some(needed)
    }

    fn close(&mut self, snap: &IndicatorSnapshot, reason: ExitReason) -> Option<ExitEvent> {
        let position = self.position.take()?;
        let exit = snap.price;

        Some(ExitEvent {
            instrument: self.instrument.clone(),
            side: position.side,
            entry: position.entry_price,
            exit,
            reason,
            pnl: position.pnl(exit),
            pnl_percent: position.pnl_percent(exit),
            duration_seconds: snap.timestamp - position.entry_timestamp,
            timestamp: snap.timestamp,
        })
    }
}
