use rust_decimal::Decimal;

use crate::types::MacdSignal;

/// Classify the MACD / signal-line relationship.
///
/// Without a previous point the sign of `macd - signal` decides, with an exact
/// zero reported as `Neutral`. With a previous point a histogram sign flip
/// wins; otherwise a positive histogram is `Bullish` and anything else,
/// including an exact zero, is `Bearish`.
pub fn classify(macd: Decimal, signal: Decimal, previous: Option<(Decimal, Decimal)>) -> MacdSignal {
    let histogram = macd - signal;

    let Some((prev_macd, prev_signal)) = previous else {
        return if histogram > Decimal::ZERO {
            MacdSignal::Bullish
        } else if histogram < Decimal::ZERO {
            MacdSignal::Bearish
        } else {
            MacdSignal::Neutral
        };
    };

    let prev_histogram = prev_macd - prev_signal;

    if prev_histogram < Decimal::ZERO && histogram > Decimal::ZERO {
        MacdSignal::BullishCrossover
    } else if prev_histogram > Decimal::ZERO && histogram < Decimal::ZERO {
        MacdSignal::BearishCrossover
    } else if histogram > Decimal::ZERO {
        MacdSignal::Bullish
    } else {
        MacdSignal::Bearish
    }
}
