use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::signal::IndicatorSnapshot;

/// Direction of a tracked trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    /// Long: profits when price rises.
    Buy,
    /// Short: profits when price falls.
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Why an open position was closed. Variants are listed in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    #[serde(rename = "TARGET_2")]
    Target2,
    #[serde(rename = "TARGET_1")]
    Target1,
    TrendReversal,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "STOP_LOSS",
            Self::Target2 => "TARGET_2",
            Self::Target1 => "TARGET_1",
            Self::TrendReversal => "TREND_REVERSAL",
        }
    }
}

/// The single open position an instrument may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: TradeSide,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_loss: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_1: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub target_2: Decimal,
    pub entry_timestamp: i64,
    /// Indicator values at entry. `None` for positions opened by hand.
    pub snapshot: Option<IndicatorSnapshot>,
}

impl Position {
    /// Signed P&L of closing at `exit_price`: `exit - entry` long, `entry - exit` short.
    pub fn pnl(&self, exit_price: Decimal) -> Decimal {
        match self.side {
            TradeSide::Buy => exit_price - self.entry_price,
            TradeSide::Sell => self.entry_price - exit_price,
        }
    }

    /// P&L as a percentage of the entry price. Zero when entry is zero.
    pub fn pnl_percent(&self, exit_price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        self.pnl(exit_price) / self.entry_price * Decimal::ONE_HUNDRED
    }
}
