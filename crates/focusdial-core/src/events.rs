use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reward::RewardId;
use crate::session::{SessionId, SessionKind, SessionRecord};
use crate::timer::StateSnapshot;

/// Every transition the engine makes produces an Event, followed by a
/// `StateChanged` snapshot. Observers subscribe to them; pollers drain them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: SessionId,
        kind: SessionKind,
        planned_secs: i64,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: SessionId,
        kind: SessionKind,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: SessionId,
        kind: SessionKind,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    BreakStarted {
        break_id: SessionId,
        parked_focus_id: Option<SessionId>,
        planned_secs: i64,
        at: DateTime<Utc>,
    },
    /// A break finished, early or naturally, and its time was credited.
    BreakEnded {
        break_id: SessionId,
        actual_secs: i64,
        natural: bool,
        resumed_focus_id: Option<SessionId>,
        at: DateTime<Utc>,
    },
    /// Focus stopped early; waiting for the user to confirm.
    CompletionRequested {
        session_id: SessionId,
        actual_secs: i64,
        at: DateTime<Utc>,
    },
    CompletionCancelled {
        session_id: SessionId,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        record: SessionRecord,
        natural: bool,
        at: DateTime<Utc>,
    },
    SessionAbandoned {
        session_id: SessionId,
        kind: SessionKind,
        at: DateTime<Utc>,
    },
    RewardUnlocked {
        reward_id: RewardId,
        session_id: SessionId,
        at: DateTime<Utc>,
    },
    /// Remaining time jumped by more than the drift threshold, typically
    /// after the process was suspended.
    BackgroundCorrection {
        session_id: SessionId,
        previous_remaining_secs: i64,
        remaining_secs: i64,
        at: DateTime<Utc>,
    },
    AdapterFailed {
        adapter: String,
        message: String,
        at: DateTime<Utc>,
    },
    PersistenceFailed {
        session_id: Option<SessionId>,
        message: String,
        at: DateTime<Utc>,
    },
    StateChanged {
        snapshot: StateSnapshot,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session_started",
            Event::SessionPaused { .. } => "session_paused",
            Event::SessionResumed { .. } => "session_resumed",
            Event::BreakStarted { .. } => "break_started",
            Event::BreakEnded { .. } => "break_ended",
            Event::CompletionRequested { .. } => "completion_requested",
            Event::CompletionCancelled { .. } => "completion_cancelled",
            Event::SessionCompleted { .. } => "session_completed",
            Event::SessionAbandoned { .. } => "session_abandoned",
            Event::RewardUnlocked { .. } => "reward_unlocked",
            Event::BackgroundCorrection { .. } => "background_correction",
            Event::AdapterFailed { .. } => "adapter_failed",
            Event::PersistenceFailed { .. } => "persistence_failed",
            Event::StateChanged { .. } => "state_changed",
        }
    }
}
