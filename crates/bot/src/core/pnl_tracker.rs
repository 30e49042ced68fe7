//! In-memory ledger of closed trades for the running session.
//!
//! Nothing is persisted; the ledger starts empty on every process start.

use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;
use tracing::warn;

use crate::types::{ExitEvent, InstrumentId, TradingStats};

#[derive(Debug, Default)]
pub struct PnLTracker {
    closed: Mutex<Vec<ExitEvent>>,
}

impl PnLTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_close(&self, exit: &ExitEvent) {
        self.ledger().push(exit.clone());
    }

    pub fn trade_count(&self) -> usize {
        self.ledger().len()
    }

    /// Statistics over every closed trade, in close order.
    pub fn stats(&self) -> TradingStats {
        compute_stats(self.ledger().iter())
    }

    /// Statistics restricted to one instrument.
    pub fn stats_for(&self, instrument: &InstrumentId) -> TradingStats {
        compute_stats(self.ledger().iter().filter(|e| &e.instrument == instrument))
    }

    /// Lock the ledger. Entries are only ever appended whole, so a poisoned
    /// lock still guards a consistent list.
    fn ledger(&self) -> MutexGuard<'_, Vec<ExitEvent>> {
        self.closed.lock().unwrap_or_else(|poisoned| {
            warn!("P&L ledger lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn compute_stats<'a>(trades: impl Iterator<Item = &'a ExitEvent>) -> TradingStats {
    let trades: Vec<&ExitEvent> = trades.collect();
    if trades.is_empty() {
        return TradingStats::default();
    }

    let total = trades.len() as u32;
    let winning = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count() as u32;
    let losing = trades.iter().filter(|t| t.pnl < Decimal::ZERO).count() as u32;
    let total_d = Decimal::from(total);

    let total_pnl: Decimal = trades.iter().map(|t| t.pnl).sum();
    let pnl_percents: Vec<Decimal> = trades.iter().map(|t| t.pnl_percent).collect();
    let avg_pnl_percent = pnl_percents.iter().copied().sum::<Decimal>() / total_d;
    let avg_hold_seconds =
        trades.iter().map(|t| t.duration_seconds).sum::<i64>() / i64::from(total);

    TradingStats {
        total_trades: total,
        winning_trades: winning,
        losing_trades: losing,
        win_rate: Decimal::from(winning) / total_d,
        total_pnl,
        avg_pnl_percent,
        avg_hold_seconds,
        max_drawdown_pct: compute_max_drawdown(&pnl_percents),
    }
}

/// Largest drop from a running peak of the cumulative sum (peak starts at 0).
fn compute_max_drawdown(returns: &[Decimal]) -> Decimal {
    let mut cumulative = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut max_drawdown = Decimal::ZERO;

    for r in returns {
        cumulative += r;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = peak - cumulative;
        if dd > max_drawdown {
            max_drawdown = dd;
        }
    }

    max_drawdown
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
