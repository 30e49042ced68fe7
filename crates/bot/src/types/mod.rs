pub mod market_data;
pub mod pnl;
pub mod position;
pub mod signal;

pub use market_data::{closes, volumes, Candle, Instrument, InstrumentId};
pub use pnl::TradingStats;
pub use position::{ExitReason, Position, TradeSide};
pub use signal::{
    CrossDirection, CrossoverEvent, EntryEvent, ExitEvent, IndicatorSnapshot, MacdReading,
    MacdSignal, ProximityDirection, ProximityEvent, SignalEvent, SmmaLevel,
};
