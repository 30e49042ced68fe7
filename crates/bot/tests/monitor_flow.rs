// End-to-end flow through the public API, without network access:
//   candles -> InstrumentMonitor (indicators, alerts, trade state) -> PnLTracker
//
// Run with: cargo test --test monitor_flow

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use smma_bot::core::monitor::{EngineParams, Evaluation, InstrumentMonitor};
use smma_bot::core::pnl_tracker::PnLTracker;
use smma_bot::core::trade_state::TradeState;
use smma_bot::types::{Candle, ExitReason, Instrument, SignalEvent, TradeSide};

// ============================================================================
// Helpers
// ============================================================================

const INTERVAL: i64 = 900;

/// Rally, pullback under the fast SMMA, then a high-volume reclaim.
const LONG_SETUP: [&str; 14] = [
    "100", "101", "102", "103", "104", "105", "106", "107", "106", "105", "104", "103", "104",
    "104.5",
];

/// Mirror image of `LONG_SETUP` around 100.
const SHORT_SETUP: [&str; 14] = [
    "100", "99", "98", "97", "96", "95", "94", "93", "94", "95", "96", "97", "96", "95.5",
];

fn series(closes: &[&str]) -> Vec<Candle> {
    let n = closes.len();
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let volume = if i + 1 == n { dec!(2000) } else { dec!(1000) };
            Candle::from_close(i as i64 * INTERVAL, c.parse().unwrap(), volume)
        })
        .collect()
}

fn with_close<'a>(closes: &[&'a str], next: &'a str) -> Vec<&'a str> {
    let mut out = closes.to_vec();
    out.push(next);
    out
}

fn small_params() -> EngineParams {
    EngineParams {
        smma_periods: vec![3, 5],
        smma_fast: 3,
        smma_slow: 5,
        rsi_period: 3,
        use_macd: false,
        volume_window: 5,
        ..EngineParams::default()
    }
}

fn trade_events(eval: Evaluation) -> Vec<SignalEvent> {
    match eval {
        Evaluation::Evaluated { events, .. } => {
            events.into_iter().filter(|e| !e.is_alert()).collect()
        }
        Evaluation::Skipped(reason) => panic!("unexpected skip: {reason:?}"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn long_trade_runs_to_target_and_is_recorded() {
    let pnl = PnLTracker::new();
    let mut monitor = InstrumentMonitor::new(Instrument::new("Nifty50", "^NSEI"), small_params());

    assert!(trade_events(monitor.evaluate(&series(&LONG_SETUP[..13]), 0)).is_empty());

    let entry = trade_events(monitor.evaluate(&series(&LONG_SETUP), 60));
    let [SignalEvent::Entry(e)] = entry.as_slice() else {
        panic!("expected one entry, got {entry:?}");
    };
    assert_eq!(e.side, TradeSide::Buy);
    assert_eq!(e.entry, dec!(104.5));
    assert_eq!(e.stop_loss, e.snapshot.smma_slow);
    assert!(e.target_1 > e.entry && e.target_2 > e.target_1);
    assert_eq!(monitor.trades().state(), TradeState::Open);

    let exit = trade_events(monitor.evaluate(&series(&with_close(&LONG_SETUP, "105.5")), 120));
    let [SignalEvent::Exit(x)] = exit.as_slice() else {
        panic!("expected one exit, got {exit:?}");
    };
    assert_eq!(x.reason, ExitReason::Target2);
    assert_eq!(x.pnl, dec!(1));
    pnl.record_close(x);

    assert_eq!(monitor.trades().state(), TradeState::Flat);
    let stats = pnl.stats();
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.winning_trades, 1);
    assert_eq!(stats.avg_hold_seconds, INTERVAL);
}

#[test]
fn short_trade_is_stopped_out() {
    let mut monitor = InstrumentMonitor::new(Instrument::new("Wipro", "WIPRO.NS"), small_params());

    monitor.evaluate(&series(&SHORT_SETUP[..13]), 0);
    let entry = trade_events(monitor.evaluate(&series(&SHORT_SETUP), 60));
    let [SignalEvent::Entry(e)] = entry.as_slice() else {
        panic!("expected one entry, got {entry:?}");
    };
    assert_eq!(e.side, TradeSide::Sell);
    assert_eq!(e.entry, dec!(95.5));
    assert!(e.stop_loss > e.entry);
    assert!(e.target_2 < e.target_1 && e.target_1 < e.entry);

    let exit = trade_events(monitor.evaluate(&series(&with_close(&SHORT_SETUP, "96")), 120));
    let [SignalEvent::Exit(x)] = exit.as_slice() else {
        panic!("expected one exit, got {exit:?}");
    };
    assert_eq!(x.reason, ExitReason::StopLoss);
    assert_eq!(x.pnl, dec!(-0.5));
    assert!(x.pnl_percent < Decimal::ZERO);
}

#[test]
fn session_stats_across_instruments() {
    let pnl = PnLTracker::new();
    let instruments = [
        Instrument::new("Nifty50", "^NSEI"),
        Instrument::new("Wipro", "WIPRO.NS"),
    ];
    let mut monitors = InstrumentMonitor::build_all(&instruments, &small_params());

    let paths: [(&[&str], &str); 2] = [(&LONG_SETUP, "105.5"), (&SHORT_SETUP, "96")];
    for (monitor, (setup, last)) in monitors.iter_mut().zip(paths) {
        monitor.evaluate(&series(&setup[..13]), 0);
        monitor.evaluate(&series(setup), 60);
        for event in trade_events(monitor.evaluate(&series(&with_close(setup, last)), 120)) {
            if let SignalEvent::Exit(x) = event {
                pnl.record_close(&x);
            }
        }
    }

    let stats = pnl.stats();
    assert_eq!(stats.total_trades, 2);
    assert_eq!(stats.winning_trades, 1);
    assert_eq!(stats.losing_trades, 1);
    assert_eq!(stats.win_rate, dec!(0.5));
    assert_eq!(stats.total_pnl, dec!(0.5));
    assert_eq!(pnl.stats_for(&instruments[1].id).total_pnl, dec!(-0.5));
}

#[test]
fn alerts_fire_alongside_trades() {
    let mut monitor = InstrumentMonitor::new(Instrument::new("Nifty50", "^NSEI"), small_params());

    let mut alerts = 0;
    for n in 8..=LONG_SETUP.len() {
        if let Evaluation::Evaluated { events, .. } =
            monitor.evaluate(&series(&LONG_SETUP[..n]), n as i64 * 1_000)
        {
            alerts += events.iter().filter(|e| e.is_alert()).count();
        }
    }
    assert!(alerts > 0);
    assert!(monitor.last_snapshot().is_some());
}
