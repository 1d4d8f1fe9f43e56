//! Collaborator contracts the engine talks to.
//!
//! The mirrors ([`StatusMirror`], [`NotificationScheduler`]) are best-effort:
//! the engine logs their failures and keeps its own timing authoritative.
//! The stores ([`SessionStore`], [`RewardStore`]) own durable records; their
//! failures are reported and the affected record is kept for retry.
//!
//! All methods take `&self` so one collaborator (e.g. a database handle) can
//! be shared behind an `Arc` by several roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, PersistenceError};
use crate::reward::RewardId;
use crate::session::{SessionId, SessionKind, SessionRecord, Task, TaskId};

/// Stable key of the single pending "session complete" alert.
pub const COMPLETION_ALERT_KEY: &str = "session-completion";

/// Payload pushed to the live status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorContent {
    pub remaining_secs: i64,
    pub total_planned_secs: i64,
    pub kind: SessionKind,
    pub label: Option<String>,
    pub paused: bool,
}

/// The one local alert scheduled per active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAlert {
    pub key: String,
    pub kind: SessionKind,
    pub label: Option<String>,
    pub fire_at: DateTime<Utc>,
}

impl CompletionAlert {
    pub fn new(kind: SessionKind, label: Option<String>, fire_at: DateTime<Utc>) -> Self {
        Self {
            key: COMPLETION_ALERT_KEY.to_string(),
            kind,
            label,
            fire_at,
        }
    }
}

/// Platform live-status surface (lock screen, status bar).
///
/// Implementations must tolerate repeated calls.
pub trait StatusMirror: Send + Sync {
    fn start(&self, content: &MirrorContent) -> Result<(), AdapterError>;

    fn update(&self, remaining_secs: i64) -> Result<(), AdapterError>;

    fn pause(&self) -> Result<(), AdapterError>;

    /// Resume, possibly switching between focus and break.
    fn resume_with_kind(&self, content: &MirrorContent) -> Result<(), AdapterError>;

    fn end(&self, completed: bool) -> Result<(), AdapterError>;
}

/// Local notification scheduling.
pub trait NotificationScheduler: Send + Sync {
    /// Schedule the completion alert, replacing any pending one.
    fn schedule_completion(&self, alert: &CompletionAlert) -> Result<(), AdapterError>;

    fn cancel_pending(&self) -> Result<(), AdapterError>;
}

/// Durable storage of sessions and tasks.
pub trait SessionStore: Send + Sync {
    /// Persist a record. Saving the same id twice must overwrite, not duplicate.
    fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError>;

    fn fetch_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, PersistenceError>;

    fn mark_task_completed(&self, id: &TaskId, additional_minutes: i64) -> Result<(), PersistenceError>;
}

/// Reward catalog and unlock ledger.
pub trait RewardStore: Send + Sync {
    fn draw_random_reward(&self) -> Result<RewardId, PersistenceError>;

    fn record_reward_unlocked(
        &self,
        reward: &RewardId,
        from_session: SessionId,
    ) -> Result<(), PersistenceError>;
}
