pub mod alert_throttle;
pub mod crossover;
pub mod data_quality;
pub mod data_service;
pub mod indicators;
pub mod macd_classifier;
pub mod monitor;
pub mod notifier;
pub mod pnl_tracker;
pub mod scanner;
pub mod trade_state;
