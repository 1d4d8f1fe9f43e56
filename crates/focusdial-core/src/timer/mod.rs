mod anchor;
mod driver;
mod engine;
mod state;

pub use anchor::{detect_drift, has_elapsed, remaining, Drift, WallAnchor, DEFAULT_DRIFT_THRESHOLD_SECS};
pub use driver::{resync, shared, spawn_ticker, spawn_ticker_with, SharedEngine, DEFAULT_TICK_PERIOD};
pub use engine::{EngineConfig, EngineSnapshot, PendingCredit, PendingUnlock, SessionEngine, TickReport};
pub use state::{EnginePhase, EngineState, StateSnapshot};
