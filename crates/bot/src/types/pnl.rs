use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Session statistics over closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Fraction of trades with positive P&L, in [0, 1].
    #[serde(with = "rust_decimal::serde::str")]
    pub win_rate: Decimal,
    /// Sum of per-trade P&L in price units.
    #[serde(with = "rust_decimal::serde::str")]
    pub total_pnl: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub avg_pnl_percent: Decimal,
    pub avg_hold_seconds: i64,
    /// Largest peak-to-trough fall of the cumulative P&L% curve, in
    /// percentage points.
    #[serde(with = "rust_decimal::serde::str")]
    pub max_drawdown_pct: Decimal,
}
