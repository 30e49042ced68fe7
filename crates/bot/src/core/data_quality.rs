//! Gates applied to fetched candles before they reach the signal engine,
//! plus the exchange trading-session check.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};

use crate::constants::IST_UTC_OFFSET_MINUTES;
use crate::errors::BotError;
use crate::types::Candle;

// ═══════════════════════════════════════════════════════════════════════════
// Series checks
// ═══════════════════════════════════════════════════════════════════════════

/// Reject series the engine must not see: empty, shorter than `min_candles`,
/// non-increasing timestamps, or negative prices/volumes.
pub fn validate_series(candles: &[Candle], min_candles: usize) -> Result<(), BotError> {
    if candles.is_empty() {
        return Err(BotError::InvalidData {
            reason: "empty candle series".into(),
        });
    }

    if candles.len() < min_candles {
        return Err(BotError::InsufficientCandles {
            have: candles.len(),
            need: min_candles,
        });
    }

    if let Some(pair) = candles
        .windows(2)
        .find(|w| w[1].timestamp <= w[0].timestamp)
    {
        return Err(BotError::InvalidData {
            reason: format!(
                "timestamps not strictly increasing: {} then {}",
                pair[0].timestamp, pair[1].timestamp
            ),
        });
    }

    if let Some(c) = candles.iter().find(|c| {
        c.open.is_sign_negative()
            || c.high.is_sign_negative()
            || c.low.is_sign_negative()
            || c.close.is_sign_negative()
            || c.volume.is_sign_negative()
    }) {
        return Err(BotError::InvalidData {
            reason: format!("negative value in candle at {}", c.timestamp),
        });
    }

    Ok(())
}

/// A candle opened at `timestamp` is closed once a full interval has passed.
pub fn is_candle_complete(timestamp: i64, interval_seconds: i64, now: i64) -> bool {
    now - timestamp >= interval_seconds
}

/// Trim a still-forming last candle. Older candles are always closed.
pub fn drop_incomplete(candles: &[Candle], interval_seconds: i64, now: i64) -> &[Candle] {
    match candles.split_last() {
        Some((last, rest)) if !is_candle_complete(last.timestamp, interval_seconds, now) => rest,
        _ => candles,
    }
}

/// Parse a provider interval such as `15m`, `1h`, `1d` or `1wk` into seconds.
pub fn parse_interval_seconds(interval: &str) -> Option<i64> {
    let split = interval.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = interval.split_at(split);
    let count: i64 = count.parse().ok()?;
    if count <= 0 {
        return None;
    }
    let unit_seconds = match unit {
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        "wk" => 7 * 86_400,
        _ => return None,
    };
    count.checked_mul(unit_seconds)
}

// ═══════════════════════════════════════════════════════════════════════════
// Market hours
// ═══════════════════════════════════════════════════════════════════════════

/// Regular trading session in the exchange's local (fixed-offset) time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub utc_offset_minutes: i32,
    pub weekdays_only: bool,
}

impl MarketHours {
    /// NSE/BSE cash session: 09:15 to 15:30 IST, Monday to Friday.
    pub fn nse() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            utc_offset_minutes: IST_UTC_OFFSET_MINUTES,
            weekdays_only: true,
        }
    }

    /// Both session bounds are inclusive.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let Some(offset) = FixedOffset::east_opt(self.utc_offset_minutes * 60) else {
            return false;
        };
        let local = now.with_timezone(&offset);

        if self.weekdays_only && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = local.time();
        time >= self.open && time <= self.close
    }

    pub fn is_open_at(&self, unix_seconds: i64) -> bool {
        DateTime::from_timestamp(unix_seconds, 0).is_some_and(|now| self.is_open(now))
    }
}
