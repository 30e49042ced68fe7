use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{CrossDirection, InstrumentId, ProximityDirection, SignalEvent};

/// Signal component of an [`AlertKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    Crossover(CrossDirection),
    Proximity(ProximityDirection),
    /// Any alert for the instrument. Used with [`AlertScope::PerInstrument`].
    Any,
}

/// Cooldown key: instrument, indicator period and signal direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub instrument: InstrumentId,
    pub period: Option<usize>,
    pub kind: AlertKind,
}

impl AlertKey {
    /// Key for a throttled event. `None` for trade entries and exits.
    pub fn for_event(event: &SignalEvent) -> Option<Self> {
        match event {
            SignalEvent::Crossover(e) => Some(Self {
                instrument: e.instrument.clone(),
                period: Some(e.period),
                kind: AlertKind::Crossover(e.direction),
            }),
            SignalEvent::Proximity(e) => Some(Self {
                instrument: e.instrument.clone(),
                period: Some(e.period),
                kind: AlertKind::Proximity(e.direction),
            }),
            SignalEvent::Entry(_) | SignalEvent::Exit(_) => None,
        }
    }

    /// One key covering every alert of an instrument.
    pub fn instrument_wide(instrument: &InstrumentId) -> Self {
        Self {
            instrument: instrument.clone(),
            period: None,
            kind: AlertKind::Any,
        }
    }
}

/// How alerts share cooldowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertScope {
    /// Each (period, signal, direction) has its own cooldown.
    #[default]
    PerSignal,
    /// One cooldown per instrument; alerts of one evaluation go out together.
    PerInstrument,
}

/// Suppresses repeats of the same alert inside a cooldown window.
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    cooldown_seconds: i64,
    last_fired_at: HashMap<AlertKey, i64>,
}

impl AlertThrottle {
    pub fn new(cooldown_seconds: i64) -> Self {
        Self {
            cooldown_seconds,
            last_fired_at: HashMap::new(),
        }
    }

    pub fn cooldown_seconds(&self) -> i64 {
        self.cooldown_seconds
    }

    /// `true` (and records `now`) when the key has never fired or its last
    /// firing is strictly more than the cooldown ago. Otherwise `false` and
    /// nothing changes.
    pub fn should_fire(&mut self, key: &AlertKey, now: i64) -> bool {
        if let Some(&last) = self.last_fired_at.get(key) {
            if now - last <= self.cooldown_seconds {
                return false;
            }
        }
        self.last_fired_at.insert(key.clone(), now);
        true
    }

    /// Seconds until `key` may fire again, or `None` if it may fire now.
    pub fn remaining(&self, key: &AlertKey, now: i64) -> Option<i64> {
        let last = *self.last_fired_at.get(key)?;
        let elapsed = now - last;
        if elapsed > self.cooldown_seconds {
            None
        } else {
            Some(self.cooldown_seconds - elapsed + 1)
        }
    }
}
