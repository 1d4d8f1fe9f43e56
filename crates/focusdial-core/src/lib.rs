//! # Focusdial Core Library
//!
//! This library provides the core logic for the Focusdial focus timer: the
//! session lifecycle, break accounting and reward unlocks. It implements a
//! CLI-first philosophy where all operations are available via a standalone
//! CLI binary, with any richer front end being a thin layer over the same
//! core library.
//!
//! ## Architecture
//!
//! - **Session Engine**: A wall-clock-based state machine that requires the
//!   caller to periodically invoke `tick()` for progress updates and
//!   `resync_from_background()` after the process was suspended
//! - **Rewards**: Threshold policy with an at-most-once guard per session
//! - **Integrations**: Traits for the live status mirror, completion
//!   notifications and persistence, with in-memory and log-backed adapters
//! - **Storage**: SQLite-based session storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: Core lifecycle state machine
//! - [`Clock`]: Injected wall-clock source
//! - [`Database`]: Session, task and reward persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod integrations;
pub mod reward;
pub mod session;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AdapterError, ConfigError, CoreError, DatabaseError, EngineError, PersistenceError};
pub use events::Event;
pub use integrations::{Collaborators, NotificationScheduler, RewardStore, SessionStore, StatusMirror};
pub use reward::{RewardCatalog, RewardId, RewardOutcome};
pub use session::{SessionId, SessionKind, SessionRecord, Task, TaskId};
pub use storage::{Config, Database};
pub use timer::{
    EngineConfig, EnginePhase, EngineSnapshot, EngineState, PendingCredit, PendingUnlock,
    SessionEngine, SharedEngine, StateSnapshot, TickReport,
};
