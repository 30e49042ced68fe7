use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use smma_bot::config;
use smma_bot::core::data_service::YahooChartSource;
use smma_bot::core::monitor::InstrumentMonitor;
use smma_bot::core::notifier::{EmailNotifier, LogNotifier, Notifier};
use smma_bot::core::pnl_tracker::PnLTracker;
use smma_bot::core::scanner::{Scanner, ScannerSettings};
use smma_bot::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignore if missing).
    let _ = dotenvy::dotenv();

    let config_dir = std::env::var("SMMA_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    let config = config::load_config(&config_dir)?;

    // Hold the guard for the process lifetime.
    let _guard = logging::init_tracing(&config.app.logging)?;

    let params = config.engine_params();
    let instruments = config.instruments();

    info!(
        instruments = instruments.len(),
        interval = %config.monitor.data_source.interval,
        smma_periods = ?params.smma_periods,
        proximity_pct = %config.signals.proximity.threshold_pct,
        use_macd = params.macd_enabled(),
        email = config.app.email.enabled,
        "SMMA signal bot starting"
    );

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    let source = YahooChartSource::new(&config.monitor.data_source)?;
    let settings = ScannerSettings::from_config(&config.monitor)?;
    let pnl = Arc::new(PnLTracker::new());
    let monitors = InstrumentMonitor::build_all(&instruments, &params);

    let notifier: Arc<dyn Notifier> = if config.app.email.enabled {
        let email = &config.app.email;
        info!(smtp_host = %email.smtp_host, to = %email.to, "email alerts enabled");
        Arc::new(EmailNotifier::new(email).context("failed to set up email alerts")?)
    } else {
        info!("email alerts disabled, events go to the log only");
        Arc::new(LogNotifier)
    };

    let mut scanner = Scanner::new(monitors, source, notifier, pnl.clone(), settings);

    // -----------------------------------------------------------------------
    // Run until Ctrl+C
    // -----------------------------------------------------------------------

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received, stopping gracefully..."),
            Err(e) => error!(error = %e, "failed to listen for Ctrl+C"),
        }
        signal_token.cancel();
    });

    scanner
        .run(shutdown)
        .await
        .context("scanner exited with error")?;

    let stats = pnl.stats();
    info!(
        trades = stats.total_trades,
        wins = stats.winning_trades,
        losses = stats.losing_trades,
        win_rate = %stats.win_rate,
        total_pnl = %stats.total_pnl,
        avg_pnl_pct = %stats.avg_pnl_percent,
        max_drawdown_pct = %stats.max_drawdown_pct,
        "session summary"
    );

    info!("shutdown complete");
    Ok(())
}
