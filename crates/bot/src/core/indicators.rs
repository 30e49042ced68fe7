//! Pure computation module for the moving-average family of indicators.
//!
//! No I/O, no side effects. Takes close/volume arrays and returns indicator
//! series. All computations use `Decimal`. Every function that needs a
//! minimum lookback returns `None` below it rather than a placeholder value,
//! so callers can tell "not yet computable" apart from a real zero.
//!
//! Indicators implemented:
//! - SMMA (smoothed moving average, `alpha = 1/period`, SMA-seeded)
//! - EMA (`alpha = 2/(span+1)`, seeded with the first sample)
//! - MACD line / signal line / histogram
//! - RSI over simple rolling means of gains and losses
//! - Trailing volume average and the high-volume test
//!
//! The two exponential smoothers are deliberately seeded differently and
//! must not be unified.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ═══════════════════════════════════════════════════════════════════════════
// Moving Averages
// ═══════════════════════════════════════════════════════════════════════════

/// Smoothed Moving Average.
///
/// The first value is the arithmetic mean of the first `period` closes; each
/// following value is `(prev * (period - 1) + close) / period`. Output length
/// is `closes.len() - period + 1`. Returns `None` if `period == 0` or there
/// are fewer than `period` closes.
pub fn smma(closes: &[Decimal], period: usize) -> Option<Vec<Decimal>> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let period_d = Decimal::from(period as u64);
    let period_minus_1 = Decimal::from(period as u64 - 1);

    let seed = closes[..period].iter().copied().sum::<Decimal>() / period_d;

    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &close in &closes[period..] {
        prev = (prev * period_minus_1 + close) / period_d;
        result.push(prev);
    }

    Some(result)
}

/// Exponential Moving Average with `alpha = 2 / (span + 1)`.
///
/// Seeded with the first sample, so the output has the same length as the
/// input. Early values are warm-up and should not be trusted on their own.
/// Returns an empty `Vec` for empty input or `span == 0`.
pub fn ema(values: &[Decimal], span: usize) -> Vec<Decimal> {
    let Some((&first, rest)) = values.split_first() else {
        return Vec::new();
    };
    if span == 0 {
        return Vec::new();
    }

    let alpha = dec!(2) / Decimal::from(span as u64 + 1);
    let one_minus_alpha = Decimal::ONE - alpha;

    let mut result = Vec::with_capacity(values.len());
    result.push(first);

    let mut prev = first;
    for &value in rest {
        prev = value * alpha + prev * one_minus_alpha;
        result.push(prev);
    }

    result
}

// ═══════════════════════════════════════════════════════════════════════════
// MACD
// ═══════════════════════════════════════════════════════════════════════════

/// MACD line, signal line and histogram, each aligned 1:1 with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Decimal>,
    pub signal: Vec<Decimal>,
    pub histogram: Vec<Decimal>,
}

impl MacdSeries {
    /// `(macd, signal, histogram)` at the last close.
    pub fn last(&self) -> Option<(Decimal, Decimal, Decimal)> {
        Some((
            *self.macd.last()?,
            *self.signal.last()?,
            *self.histogram.last()?,
        ))
    }

    /// `(macd, signal)` one close before the last.
    pub fn previous(&self) -> Option<(Decimal, Decimal)> {
        let n = self.macd.len();
        if n < 2 {
            return None;
        }
        Some((self.macd[n - 2], self.signal[n - 2]))
    }
}

/// Moving Average Convergence Divergence.
///
/// `macd = ema(fast) - ema(slow)`, `signal = ema(macd, signal)`,
/// `histogram = macd - signal`. Returns `None` below `slow + signal` closes.
pub fn macd(closes: &[Decimal], fast: usize, slow: usize, signal: usize) -> Option<MacdSeries> {
    if fast == 0 || slow == 0 || signal == 0 || closes.len() < slow + signal {
        return None;
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let macd_line: Vec<Decimal> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema(&macd_line, signal);

    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    Some(MacdSeries {
        macd: macd_line,
        signal: signal_line,
        histogram,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// RSI
// ═══════════════════════════════════════════════════════════════════════════

/// Relative Strength Index over simple rolling means.
///
/// Gains and losses come from successive close differences and are each
/// averaged over a plain `period`-wide window (no Wilder smoothing). One value
/// per close from index `period` onward, so the output length is
/// `closes.len() - period`. A window with zero average loss saturates at 100.
/// Returns `None` below `period + 1` closes.
pub fn rsi(closes: &[Decimal], period: usize) -> Option<Vec<Decimal>> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let period_d = Decimal::from(period as u64);

    let changes: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<Decimal> = changes.iter().map(|&c| c.max(Decimal::ZERO)).collect();
    let losses: Vec<Decimal> = changes.iter().map(|&c| (-c).max(Decimal::ZERO)).collect();

    let values = gains
        .windows(period)
        .zip(losses.windows(period))
        .map(|(g, l)| {
            let avg_gain = g.iter().copied().sum::<Decimal>() / period_d;
            let avg_loss = l.iter().copied().sum::<Decimal>() / period_d;
            rsi_from_averages(avg_gain, avg_loss)
        })
        .collect();

    Some(values)
}

fn rsi_from_averages(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
    if avg_loss.is_zero() {
        return dec!(100);
    }
    let rs = avg_gain / avg_loss;
    dec!(100) - dec!(100) / (Decimal::ONE + rs)
}

// ═══════════════════════════════════════════════════════════════════════════
// Volume
// ═══════════════════════════════════════════════════════════════════════════

/// Mean of the last `window` volumes, current candle included.
///
/// Uses every available volume when fewer than `window` exist. Returns `None`
/// for empty input or `window == 0`.
pub fn volume_average(volumes: &[Decimal], window: usize) -> Option<Decimal> {
    if volumes.is_empty() || window == 0 {
        return None;
    }
    let tail = &volumes[volumes.len().saturating_sub(window)..];
    Some(tail.iter().copied().sum::<Decimal>() / Decimal::from(tail.len() as u64))
}

/// `true` when `current > average * threshold`.
pub fn is_volume_high(current: Decimal, average: Decimal, threshold: Decimal) -> bool {
    current > average * threshold
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
