//! Market data client for the signal scanner.
//!
//! Candles come from the Yahoo Finance chart API
//! (`/v8/finance/chart/{symbol}?interval=..&range=..`), which covers NSE/BSE
//! indices and equities. Rows with any missing field are dropped, floats are
//! converted to `Decimal`, and transient failures are retried with
//! exponential backoff.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DataSourceConfig;
use crate::errors::BotError;
use crate::types::{Candle, Instrument};

// ═══════════════════════════════════════════════════════════════════════════
// Source trait
// ═══════════════════════════════════════════════════════════════════════════

/// Anything that can hand the scanner an ordered candle series.
#[async_trait]
pub trait CandleSource: Send + Sync {
    fn name(&self) -> &str;

    /// Candles oldest first. The last one may still be forming.
    async fn fetch_candles(&self, instrument: &Instrument) -> Result<Vec<Candle>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Retry
// ═══════════════════════════════════════════════════════════════════════════

/// Attempt budget and exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    pub backoff_factor: u64,
    /// Delay unit; the wait after attempt `n` (0-based) is `unit * factor^n`.
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: u64) -> Self {
        Self {
            max_retries,
            backoff_factor,
            unit: Duration::from_secs(1),
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let multiple = self.backoff_factor.saturating_pow(attempt);
        self.unit.saturating_mul(u32::try_from(multiple).unwrap_or(u32::MAX))
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_retries.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < attempts => {
                    let wait = self.delay(attempt);
                    warn!(
                        target_label = label,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("{label}: failed after {attempts} attempts")))
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Yahoo chart source
// ═══════════════════════════════════════════════════════════════════════════

pub struct YahooChartSource {
    client: reqwest::Client,
    base_url: String,
    interval: String,
    range: String,
    retry: RetryPolicy,
}

impl YahooChartSource {
    pub fn new(config: &DataSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("smma-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            interval: config.interval.clone(),
            range: config.history_range.clone(),
            retry: RetryPolicy::new(config.max_retries, config.backoff_factor),
        })
    }

    async fn fetch_once(&self, symbol: &str) -> Result<Vec<Candle>> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        let start = Instant::now();

        let resp = self
            .client
            .get(&url)
            .query(&[("interval", self.interval.as_str()), ("range", self.range.as_str())])
            .send()
            .await
            .map_err(BotError::from)
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(symbol, "rate limited by chart API");
            return Err(BotError::DataUnavailable { name: url }.into());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(symbol, %status, body = %body, "chart API returned error status");
            return Err(BotError::DataUnavailable { name: url }.into());
        }

        let body = resp
            .bytes()
            .await
            .map_err(BotError::from)
            .with_context(|| format!("read body from {url}"))?;
        let data = decode_body(&body).with_context(|| format!("parse JSON from {url}"))?;

        let candles = parse_chart(&data, symbol)?;

        debug!(
            symbol,
            interval = %self.interval,
            candles = candles.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "fetched candles"
        );

        Ok(candles)
    }
}

#[async_trait]
impl CandleSource for YahooChartSource {
    fn name(&self) -> &str {
        "yahoo_chart"
    }

    async fn fetch_candles(&self, instrument: &Instrument) -> Result<Vec<Candle>> {
        let symbol = instrument.symbol.as_str();
        self.retry.run(symbol, move || self.fetch_once(symbol)).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parsing
// ═══════════════════════════════════════════════════════════════════════════

/// Decode a raw response body into JSON.
pub fn decode_body(body: &[u8]) -> Result<Value, BotError> {
    Ok(serde_json::from_slice(body)?)
}

/// Parse a chart API response body into candles, oldest first.
///
/// Rows where any of the five OHLCV fields is null are skipped.
pub fn parse_chart(data: &Value, symbol: &str) -> Result<Vec<Candle>, BotError> {
    let chart = &data["chart"];

    if let Some(err) = chart.get("error").filter(|e| !e.is_null()) {
        let description = err["description"].as_str().unwrap_or("unknown error");
        return Err(BotError::DataUnavailable {
            name: format!("{symbol}: {description}"),
        });
    }

    let result = chart["result"]
        .as_array()
        .and_then(|r| r.first())
        .ok_or_else(|| BotError::DataUnavailable {
            name: format!("{symbol}: empty chart result"),
        })?;

    let Some(timestamps) = result["timestamp"].as_array() else {
        // No trades in the requested range.
        return Ok(Vec::new());
    };

    let quote = &result["indicators"]["quote"][0];
    let open = quote_column(quote, "open", symbol)?;
    let high = quote_column(quote, "high", symbol)?;
    let low = quote_column(quote, "low", symbol)?;
    let close = quote_column(quote, "close", symbol)?;
    let volume = quote_column(quote, "volume", symbol)?;

    let candles = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            Some(Candle {
                timestamp: ts.as_i64()?,
                open: parse_decimal(open.get(i)?)?,
                high: parse_decimal(high.get(i)?)?,
                low: parse_decimal(low.get(i)?)?,
                close: parse_decimal(close.get(i)?)?,
                volume: parse_decimal(volume.get(i)?)?,
            })
        })
        .collect();

    Ok(candles)
}

fn quote_column<'a>(quote: &'a Value, name: &str, symbol: &str) -> Result<&'a Vec<Value>, BotError> {
    quote[name].as_array().ok_or_else(|| BotError::InvalidData {
        reason: format!("{symbol}: missing {name} column"),
    })
}

/// Parse a JSON number (or numeric string) as `Decimal`. `None` for null/NaN.
fn parse_decimal(v: &Value) -> Option<Decimal> {
    if let Some(i) = v.as_i64() {
        return Some(Decimal::from(i));
    }
    v.as_f64()
        .and_then(Decimal::from_f64)
        .or_else(|| v.as_str().and_then(|s| s.parse::<Decimal>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    // -- parse_chart ----------------------------------------------------------

    #[test]
    fn test_parse_chart() {
        let body = json!({
            "chart": {
                "result": [{
                    "meta": { "symbol": "^NSEI" },
                    "timestamp": [1700000000, 1700000900, 1700001800],
                    "indicators": { "quote": [{
                        "open":   [100.5, 101.0, null],
                        "high":   [101.0, 102.0, 103.0],
                        "low":    [100.0, 100.5, 101.5],
                        "close":  [100.75, 101.5, 102.0],
                        "volume": [1200, 0, 900]
                    }]}
                }],
                "error": null
            }
        });
        let candles = parse_chart(&body, "^NSEI").unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1_700_000_000);
        assert_eq!(candles[0].close, dec!(100.75));
        assert_eq!(candles[0].volume, dec!(1200));
        assert_eq!(candles[1].volume, Decimal::ZERO);
    }

    #[test]
    fn test_parse_chart_error_payload() {
        let body = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });
        let err = parse_chart(&body, "XYZ.NS").unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_parse_chart_empty_range() {
        let body = json!({
            "chart": { "result": [{ "meta": {}, "indicators": { "quote": [{}] } }], "error": null }
        });
        assert!(parse_chart(&body, "^NSEI").unwrap().is_empty());
    }

    #[test]
    fn test_parse_chart_missing_column() {
        let body = json!({
            "chart": { "result": [{
                "timestamp": [1],
                "indicators": { "quote": [{ "open": [1.0] }] }
            }], "error": null }
        });
        assert!(matches!(
            parse_chart(&body, "^NSEI"),
            Err(BotError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_decode_body_rejects_non_json() {
        assert!(matches!(
            decode_body(b"<html>maintenance</html>"),
            Err(BotError::SerdeJson(_))
        ));
        assert!(decode_body(br#"{"chart": {"result": null}}"#).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_surfaces_transport_error() {
        let config: DataSourceConfig = serde_json::from_value(json!({
            "base_url": "http://127.0.0.1:1",
            "interval": "15m",
            "history_range": "1d",
            "timeout_seconds": 2,
            "max_retries": 1
        }))
        .unwrap();
        let source = YahooChartSource::new(&config).unwrap();

        let err = source
            .fetch_candles(&Instrument::new("Nifty50", "^NSEI"))
            .await
            .unwrap_err();
        assert!(
            err.chain()
                .any(|c| matches!(c.downcast_ref::<BotError>(), Some(BotError::Reqwest(_)))),
            "unexpected error: {err:#}"
        );
    }

    // -- RetryPolicy ----------------------------------------------------------

    #[test]
    fn test_backoff_delays() {
        let p = RetryPolicy::new(3, 2);
        assert_eq!(p.delay(0), Duration::from_secs(1));
        assert_eq!(p.delay(1), Duration::from_secs(2));
        assert_eq!(p.delay(2), Duration::from_secs(4));
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_factor: 2,
            unit: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = fast_policy(3)
            .run("test", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    anyhow::bail!("transient {n}");
                }
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = fast_policy(3)
            .run("^NSEI", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("down"))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("failed after 3 attempts"));
    }
}
