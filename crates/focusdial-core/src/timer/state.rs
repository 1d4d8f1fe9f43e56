use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::anchor::WallAnchor;
use crate::session::{SessionId, SessionKind, SessionRecord};

/// Externally visible lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    RunningFocus,
    PausedFocus,
    RunningBreak,
    PausedBreak,
    AwaitingCompletionConfirmation,
}

impl EnginePhase {
    pub fn is_running(self) -> bool {
        matches!(self, EnginePhase::RunningFocus | EnginePhase::RunningBreak)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, EnginePhase::PausedFocus | EnginePhase::PausedBreak)
    }
}

impl fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnginePhase::Idle => "idle",
            EnginePhase::RunningFocus => "running focus",
            EnginePhase::PausedFocus => "paused focus",
            EnginePhase::RunningBreak => "running break",
            EnginePhase::PausedBreak => "paused break",
            EnginePhase::AwaitingCompletionConfirmation => "awaiting completion confirmation",
        };
        f.write_str(s)
    }
}

/// Owned engine state.
///
/// `parked_focus` is only ever present while the active session is a break,
/// and a break never parks another break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running {
        active: SessionRecord,
        anchor: WallAnchor,
        #[serde(default)]
        parked_focus: Option<SessionRecord>,
    },
    Paused {
        active: SessionRecord,
        #[serde(default)]
        parked_focus: Option<SessionRecord>,
    },
    AwaitingCompletionConfirmation {
        pending: SessionRecord,
    },
}

impl Default for EngineState {
    fn default() -> Self {
        EngineState::Idle
    }
}

impl EngineState {
    pub fn phase(&self) -> EnginePhase {
        match self {
            EngineState::Idle => EnginePhase::Idle,
            EngineState::Running { active, .. } => match active.kind {
                SessionKind::Focus => EnginePhase::RunningFocus,
                SessionKind::Break => EnginePhase::RunningBreak,
            },
            EngineState::Paused { active, .. } => match active.kind {
                SessionKind::Focus => EnginePhase::PausedFocus,
                SessionKind::Break => EnginePhase::PausedBreak,
            },
            EngineState::AwaitingCompletionConfirmation { .. } => {
                EnginePhase::AwaitingCompletionConfirmation
            }
        }
    }

    pub fn active(&self) -> Option<&SessionRecord> {
        match self {
            EngineState::Running { active, .. } | EngineState::Paused { active, .. } => Some(active),
            _ => None,
        }
    }

    pub fn parked_focus(&self) -> Option<&SessionRecord> {
        match self {
            EngineState::Running { parked_focus, .. } | EngineState::Paused { parked_focus, .. } => {
                parked_focus.as_ref()
            }
            _ => None,
        }
    }

    pub fn pending_confirmation(&self) -> Option<&SessionRecord> {
        match self {
            EngineState::AwaitingCompletionConfirmation { pending } => Some(pending),
            _ => None,
        }
    }

    pub fn anchor(&self) -> Option<&WallAnchor> {
        match self {
            EngineState::Running { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    /// Remaining seconds of the current session at `now`.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            EngineState::Idle => None,
            EngineState::Running { anchor, .. } => Some(anchor.remaining(now)),
            EngineState::Paused { active, .. } => Some(active.remaining()),
            EngineState::AwaitingCompletionConfirmation { pending } => Some(pending.remaining()),
        }
    }
}

/// Point-in-time view handed to observers after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub phase: EnginePhase,
    pub session_id: Option<SessionId>,
    pub kind: Option<SessionKind>,
    pub label: Option<String>,
    pub remaining_secs: i64,
    pub planned_secs: i64,
    pub actual_secs: i64,
    /// Remaining time of the focus session parked behind a break.
    pub parked_focus_remaining_secs: Option<i64>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_follows_active_kind() {
        let now = Utc::now();
        let state = EngineState::Running {
            active: SessionRecord::break_session(300),
            anchor: WallAnchor::starting(now, 300),
            parked_focus: Some(SessionRecord::focus(1500, None)),
        };
        assert_eq!(state.phase(), EnginePhase::RunningBreak);
        assert!(state.phase().is_running());
        assert!(state.parked_focus().is_some());

        let paused = EngineState::Paused {
            active: SessionRecord::focus(1500, None),
            parked_focus: None,
        };
        assert_eq!(paused.phase(), EnginePhase::PausedFocus);
        assert_eq!(paused.remaining_at(now), Some(1500));
    }

    #[test]
    fn state_serializes_with_phase_tag() {
        let state = EngineState::AwaitingCompletionConfirmation {
            pending: SessionRecord::focus(60, None),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["phase"], "awaiting_completion_confirmation");
        let back: EngineState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
