//! Session records and the task back-reference.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Focus,
    Break,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Focus => "focus",
            SessionKind::Break => "break",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(SessionKind::Focus),
            "break" => Ok(SessionKind::Break),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// Opaque, immutable session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Foreign reference to a task owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Task as resolved by the persistence layer. The engine only reads the
/// title for labels and reports completion back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    /// Focus minutes credited to this task so far.
    #[serde(default)]
    pub focus_minutes: i64,
}

/// One timed interval, focus or break.
///
/// Durations are whole seconds. `actual_duration` only grows while the
/// session is active and is frozen once `is_completed` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub kind: SessionKind,
    pub planned_duration: i64,
    pub actual_duration: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub task: Option<TaskId>,
    /// Break seconds that interrupted this focus session. Always zero on breaks.
    #[serde(default)]
    pub break_time_accrued: i64,
    /// Set on a focus session once a break has been taken against it.
    #[serde(default)]
    pub was_interrupted: bool,
}

impl SessionRecord {
    pub fn focus(planned_duration: i64, task: Option<TaskId>) -> Self {
        Self::new(SessionKind::Focus, planned_duration, task)
    }

    pub fn break_session(planned_duration: i64) -> Self {
        Self::new(SessionKind::Break, planned_duration, None)
    }

    fn new(kind: SessionKind, planned_duration: i64, task: Option<TaskId>) -> Self {
        Self {
            id: SessionId::new(),
            kind,
            planned_duration,
            actual_duration: 0,
            started_at: None,
            ended_at: None,
            is_completed: false,
            task,
            break_time_accrued: 0,
            was_interrupted: false,
        }
    }

    /// Planned time not yet run.
    pub fn remaining(&self) -> i64 {
        (self.planned_duration - self.actual_duration).max(0)
    }

    /// Raise `actual_duration` to `elapsed`, never lowering it and never
    /// exceeding the plan. No-op once completed.
    pub fn record_elapsed(&mut self, elapsed: i64) {
        if self.is_completed {
            return;
        }
        let clamped = elapsed.clamp(0, self.planned_duration);
        self.actual_duration = self.actual_duration.max(clamped);
    }

    /// Credit a finished break against this focus session.
    pub fn accrue_break(&mut self, break_secs: i64) {
        if self.kind == SessionKind::Focus {
            self.break_time_accrued += break_secs.max(0);
        }
    }

    pub fn mark_started(&mut self, at: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(at);
        }
    }

    /// Set the end timestamp and completion flag. `ended_at` is only ever set once.
    pub fn finish(&mut self, at: DateTime<Utc>, completed: bool) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
        if completed {
            self.is_completed = true;
        }
    }
}
