//! Session lifecycle engine.
//!
//! A wall-clock-based state machine. It does not use internal threads; the
//! caller drives it with `tick(now)` once per second and calls
//! `resync_from_background()` when the app returns to the foreground.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> RunningFocus <-> PausedFocus
//! RunningFocus | PausedFocus -> RunningBreak <-> PausedBreak -> RunningFocus
//! RunningFocus | PausedFocus -> AwaitingCompletionConfirmation -> Idle | RunningFocus
//! RunningFocus (expired) -> Idle
//! ```
//!
//! Every command first settles any natural completions that are already due,
//! so a command issued after a long suspension acts on the true state.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = SessionEngine::new(EngineConfig::default(), clock, collaborators);
//! engine.start(25 * 60, None)?;
//! // Once per second:
//! engine.tick(clock.now());
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::anchor::{detect_drift, Drift, WallAnchor, DEFAULT_DRIFT_THRESHOLD_SECS};
use super::state::{EnginePhase, EngineState, StateSnapshot};
use crate::clock::Clock;
use crate::error::{AdapterError, Command, EngineError, PersistenceError};
use crate::events::Event;
use crate::integrations::{
    Collaborators, CompletionAlert, MirrorContent, NotificationScheduler, StatusMirror,
};
use crate::reward::{self, AwardGuard, RewardId, RewardOutcome};
use crate::session::{SessionId, SessionKind, SessionRecord, TaskId};

/// Events kept for `drain_events` before the oldest are dropped.
const EVENT_BUFFER_CAPACITY: usize = 256;

/// Read-only settings injected into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum actual focus time that unlocks a reward.
    pub reward_threshold_secs: i64,
    /// Jump in remaining time reported as a background correction.
    pub drift_threshold_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reward_threshold_secs: 25 * 60,
            drift_threshold_secs: DEFAULT_DRIFT_THRESHOLD_SECS,
        }
    }
}

/// Everything needed to rebuild an engine after the process restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub state: EngineState,
    #[serde(default)]
    pub focus_label: Option<String>,
    #[serde(default)]
    pub last_remaining: Option<i64>,
    #[serde(default)]
    pub awarded: AwardGuard,
    #[serde(default)]
    pub unsaved: Vec<SessionRecord>,
    #[serde(default)]
    pub pending_unlocks: Vec<PendingUnlock>,
    #[serde(default)]
    pub pending_credits: Vec<PendingCredit>,
    #[serde(default)]
    pub mirror_ended_for: Option<SessionId>,
}

/// A reward unlock whose write failed. It is announced once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUnlock {
    pub reward_id: RewardId,
    pub session_id: SessionId,
}

/// Focus minutes owed to a task whose update failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCredit {
    pub task: TaskId,
    pub session_id: SessionId,
    pub minutes: i64,
}

/// Result of a tick or resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub phase: EnginePhase,
    pub remaining_secs: Option<i64>,
    /// Natural completions settled by this call.
    pub completions: usize,
    /// Remaining time was corrected by more than the drift threshold.
    pub corrected: bool,
}

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

pub struct SessionEngine {
    state: EngineState,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    collab: Collaborators,
    /// Task title shown for the current focus session.
    focus_label: Option<String>,
    last_remaining: Option<i64>,
    awarded: AwardGuard,
    unsaved: Vec<SessionRecord>,
    pending_unlocks: Vec<PendingUnlock>,
    pending_credits: Vec<PendingCredit>,
    mirror_ended_for: Option<SessionId>,
    events: VecDeque<Event>,
    listeners: Vec<Listener>,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("unsaved", &self.unsaved.len())
            .field("pending_unlocks", &self.pending_unlocks.len())
            .field("pending_credits", &self.pending_credits.len())
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>, collab: Collaborators) -> Self {
        Self::restore(EngineSnapshot::default(), config, clock, collab)
    }

    /// Rebuild from a snapshot. Call `resync_from_background` afterwards to
    /// settle whatever happened while the process was gone.
    pub fn restore(
        snapshot: EngineSnapshot,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        collab: Collaborators,
    ) -> Self {
        Self {
            state: snapshot.state,
            config,
            clock,
            collab,
            focus_label: snapshot.focus_label,
            last_remaining: snapshot.last_remaining,
            awarded: snapshot.awarded,
            unsaved: snapshot.unsaved,
            pending_unlocks: snapshot.pending_unlocks,
            pending_credits: snapshot.pending_credits,
            mirror_ended_for: snapshot.mirror_ended_for,
            events: VecDeque::new(),
            listeners: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.state.clone(),
            focus_label: self.focus_label.clone(),
            last_remaining: self.last_remaining,
            awarded: self.awarded.clone(),
            unsaved: self.unsaved.clone(),
            pending_unlocks: self.pending_unlocks.clone(),
            pending_credits: self.pending_credits.clone(),
            mirror_ended_for: self.mirror_ended_for,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> EnginePhase {
        self.state.phase()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Remaining seconds of the current session, recomputed from the anchor.
    pub fn remaining(&self) -> Option<i64> {
        self.state.remaining_at(self.clock.now())
    }

    pub fn status(&self) -> StateSnapshot {
        self.status_at(self.clock.now())
    }

    /// Records whose save failed and are waiting for `retry_pending_saves`.
    pub fn unsaved_records(&self) -> &[SessionRecord] {
        &self.unsaved
    }

    pub fn pending_unlocks(&self) -> &[PendingUnlock] {
        &self.pending_unlocks
    }

    pub fn pending_credits(&self) -> &[PendingCredit] {
        &self.pending_credits
    }

    /// Register an observer called synchronously for every event.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Take all buffered events, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, duration_secs: i64, task: Option<TaskId>) -> Result<EnginePhase, EngineError> {
        validate_duration(duration_secs)?;
        let now = self.clock.now();
        self.catch_up(now);
        if !matches!(self.state, EngineState::Idle) {
            return Err(self.reject(Command::Start));
        }

        let label = task.as_ref().and_then(|t| self.task_title(t, now));
        let mut record = SessionRecord::focus(duration_secs, task);
        record.mark_started(now);
        let anchor = WallAnchor::starting(now, duration_secs);
        let session_id = record.id;

        info!(%session_id, duration_secs, "focus session started");
        self.focus_label = label;
        self.mirror_ended_for = None;
        self.last_remaining = Some(duration_secs);
        self.reschedule_alert(SessionKind::Focus, anchor.planned_end, now);
        let content = self.mirror_content(&record, duration_secs, false);
        self.mirror_call(now, |m| m.start(&content));

        self.state = EngineState::Running {
            active: record,
            anchor,
            parked_focus: None,
        };
        self.emit(Event::SessionStarted {
            session_id,
            kind: SessionKind::Focus,
            planned_secs: duration_secs,
            at: now,
        });
        self.emit_state_changed(now);
        Ok(self.phase())
    }

    pub fn pause(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        self.catch_up(now);
        let (mut active, anchor, parked_focus) = match std::mem::take(&mut self.state) {
            EngineState::Running {
                active,
                anchor,
                parked_focus,
            } => (active, anchor, parked_focus),
            other => {
                self.state = other;
                // The confirmation gate takes precedence over pausing.
                if self.phase() == EnginePhase::AwaitingCompletionConfirmation {
                    return Ok(self.phase());
                }
                return Err(self.reject(Command::Pause));
            }
        };

        freeze(&mut active, &anchor, now);
        let remaining_secs = active.remaining();
        info!(session_id = %active.id, kind = %active.kind, remaining_secs, "session paused");
        self.cancel_alert(now);
        self.mirror_call(now, |m| m.pause());
        self.last_remaining = Some(remaining_secs);

        let event = Event::SessionPaused {
            session_id: active.id,
            kind: active.kind,
            remaining_secs,
            at: now,
        };
        self.state = EngineState::Paused {
            active,
            parked_focus,
        };
        self.emit(event);
        self.emit_state_changed(now);
        Ok(self.phase())
    }

    pub fn resume(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        self.catch_up(now);
        let (active, parked_focus) = match std::mem::take(&mut self.state) {
            EngineState::Paused {
                active,
                parked_focus,
            } => (active, parked_focus),
            other => {
                self.state = other;
                return Err(self.reject(Command::Resume));
            }
        };

        let remaining_secs = active.remaining();
        let anchor = WallAnchor::starting(now, remaining_secs);
        info!(session_id = %active.id, kind = %active.kind, remaining_secs, "session resumed");
        self.reschedule_alert(active.kind, anchor.planned_end, now);
        let content = self.mirror_content(&active, remaining_secs, false);
        self.mirror_call(now, |m| m.resume_with_kind(&content));
        self.last_remaining = Some(remaining_secs);

        let event = Event::SessionResumed {
            session_id: active.id,
            kind: active.kind,
            remaining_secs,
            at: now,
        };
        self.state = EngineState::Running {
            active,
            anchor,
            parked_focus,
        };
        self.emit(event);
        self.emit_state_changed(now);
        self.catch_up(now);
        Ok(self.phase())
    }

    /// Park the current focus session (if any) and run a break.
    ///
    /// From `Idle` this starts a standalone break with nothing parked.
    pub fn start_break(&mut self, duration_secs: i64) -> Result<EnginePhase, EngineError> {
        validate_duration(duration_secs)?;
        let now = self.clock.now();
        self.catch_up(now);
        let parked = match std::mem::take(&mut self.state) {
            EngineState::Idle => None,
            EngineState::Running {
                mut active,
                anchor,
                parked_focus: None,
            } if active.kind == SessionKind::Focus => {
                freeze(&mut active, &anchor, now);
                Some(active)
            }
            EngineState::Paused {
                active,
                parked_focus: None,
            } if active.kind == SessionKind::Focus => Some(active),
            other => {
                self.state = other;
                return Err(self.reject(Command::StartBreak));
            }
        };

        let parked = parked.map(|mut focus| {
            focus.was_interrupted = true;
            focus
        });
        let mut record = SessionRecord::break_session(duration_secs);
        record.mark_started(now);
        let anchor = WallAnchor::starting(now, duration_secs);
        let break_id = record.id;
        let parked_focus_id = parked.as_ref().map(|f| f.id);

        info!(%break_id, duration_secs, parked = parked_focus_id.is_some(), "break started");
        self.mirror_ended_for = None;
        self.last_remaining = Some(duration_secs);
        self.reschedule_alert(SessionKind::Break, anchor.planned_end, now);
        let content = self.mirror_content(&record, duration_secs, false);
        if parked.is_some() {
            self.mirror_call(now, |m| m.resume_with_kind(&content));
        } else {
            self.mirror_call(now, |m| m.start(&content));
        }

        self.state = EngineState::Running {
            active: record,
            anchor,
            parked_focus: parked,
        };
        self.emit(Event::BreakStarted {
            break_id,
            parked_focus_id,
            planned_secs: duration_secs,
            at: now,
        });
        self.emit_state_changed(now);
        Ok(self.phase())
    }

    pub fn end_break_early(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        self.catch_up(now);
        match self.take_break(now) {
            Some((record, parked)) => {
                self.finish_break(record, parked, now, now, false);
                Ok(self.phase())
            }
            None => Err(self.reject(Command::EndBreakEarly)),
        }
    }

    /// Stop the active session.
    ///
    /// A focus session goes to the confirmation gate. A break is finished
    /// immediately; breaks never need confirmation.
    pub fn stop(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        self.catch_up(now);
        if let Some((record, parked)) = self.take_break(now) {
            self.finish_break(record, parked, now, now, false);
            return Ok(self.phase());
        }

        let pending = match std::mem::take(&mut self.state) {
            EngineState::Running {
                mut active, anchor, ..
            } if active.kind == SessionKind::Focus => {
                freeze(&mut active, &anchor, now);
                active
            }
            EngineState::Paused { active, .. } if active.kind == SessionKind::Focus => active,
            other => {
                self.state = other;
                return Err(self.reject(Command::Stop));
            }
        };

        info!(
            session_id = %pending.id,
            actual_secs = pending.actual_duration,
            "focus stopped, awaiting confirmation"
        );
        self.cancel_alert(now);
        self.last_remaining = Some(pending.remaining());
        let event = Event::CompletionRequested {
            session_id: pending.id,
            actual_secs: pending.actual_duration,
            at: now,
        };
        self.state = EngineState::AwaitingCompletionConfirmation { pending };
        self.emit(event);
        self.emit_state_changed(now);
        Ok(self.phase())
    }

    pub fn confirm_completion(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        match std::mem::take(&mut self.state) {
            EngineState::AwaitingCompletionConfirmation { pending } => {
                self.complete_focus(pending, now, false);
                Ok(self.phase())
            }
            other => {
                self.state = other;
                Err(self.reject(Command::ConfirmCompletion))
            }
        }
    }

    /// Withdraw the stop request and keep the focus session running from
    /// where it was stopped.
    pub fn cancel_completion(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        let pending = match std::mem::take(&mut self.state) {
            EngineState::AwaitingCompletionConfirmation { pending } => pending,
            other => {
                self.state = other;
                return Err(self.reject(Command::CancelCompletion));
            }
        };

        let remaining_secs = pending.remaining();
        let anchor = WallAnchor::starting(now, remaining_secs);
        info!(session_id = %pending.id, remaining_secs, "completion cancelled, focus resumed");
        self.reschedule_alert(SessionKind::Focus, anchor.planned_end, now);
        let content = self.mirror_content(&pending, remaining_secs, false);
        self.mirror_call(now, |m| m.resume_with_kind(&content));
        self.last_remaining = Some(remaining_secs);

        let event = Event::CompletionCancelled {
            session_id: pending.id,
            remaining_secs,
            at: now,
        };
        self.state = EngineState::Running {
            active: pending,
            anchor,
            parked_focus: None,
        };
        self.emit(event);
        self.emit_state_changed(now);
        self.catch_up(now);
        Ok(self.phase())
    }

    /// Discard whatever is active, parked or pending confirmation.
    ///
    /// Discarded records are handed to persistence uncompleted and never
    /// evaluated for a reward.
    pub fn abandon(&mut self) -> Result<EnginePhase, EngineError> {
        let now = self.clock.now();
        self.catch_up(now);
        let (active, parked) = match std::mem::take(&mut self.state) {
            EngineState::Running {
                mut active,
                anchor,
                parked_focus,
            } => {
                freeze(&mut active, &anchor, now);
                (active, parked_focus)
            }
            EngineState::Paused {
                active,
                parked_focus,
            } => (active, parked_focus),
            EngineState::AwaitingCompletionConfirmation { pending } => (pending, None),
            EngineState::Idle => return Err(self.reject(Command::Abandon)),
        };

        info!(session_id = %active.id, kind = %active.kind, "session abandoned");
        self.cancel_alert(now);
        self.end_mirror(active.id, false, now);
        let event = Event::SessionAbandoned {
            session_id: active.id,
            kind: active.kind,
            at: now,
        };
        for mut record in std::iter::once(active).chain(parked) {
            record.finish(now, false);
            self.persist(&record, now);
        }
        self.focus_label = None;
        self.last_remaining = None;
        self.emit(event);
        self.emit_state_changed(now);
        Ok(self.phase())
    }

    /// Recompute remaining time from the anchor and settle natural
    /// completions. Call once per second from a single driver.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let completions = self.catch_up(now);
        let mut corrected = false;

        let running = match &mut self.state {
            EngineState::Running { active, anchor, .. } => {
                let remaining = anchor.remaining(now);
                active.record_elapsed(active.planned_duration - remaining);
                Some((active.id, remaining))
            }
            _ => None,
        };

        let remaining_secs = match running {
            Some((session_id, remaining)) => {
                match detect_drift(self.last_remaining, remaining, self.config.drift_threshold_secs) {
                    Drift::Correction { previous, current } => {
                        corrected = true;
                        warn!(%session_id, previous, current, "background correction of remaining time");
                        self.emit(Event::BackgroundCorrection {
                            session_id,
                            previous_remaining_secs: previous,
                            remaining_secs: current,
                            at: now,
                        });
                    }
                    Drift::Fresh | Drift::Steady => {
                        debug!(%session_id, remaining, "tick");
                    }
                }
                self.last_remaining = Some(remaining);
                self.mirror_call(now, |m| m.update(remaining));
                Some(remaining)
            }
            None => self.state.remaining_at(now),
        };

        TickReport {
            phase: self.phase(),
            remaining_secs,
            completions,
            corrected,
        }
    }

    /// Re-derive timing after the app returns from the background and bring
    /// both mirrors back in line with the authoritative state.
    pub fn resync_from_background(&mut self) -> TickReport {
        let now = self.clock.now();
        let report = self.tick(now);

        let running = match &self.state {
            EngineState::Running { active, anchor, .. } => Some((
                active.kind,
                anchor.planned_end,
                self.mirror_content(active, anchor.remaining(now), false),
            )),
            _ => None,
        };
        if let Some((kind, fire_at, content)) = running {
            self.reschedule_alert(kind, fire_at, now);
            self.mirror_call(now, |m| m.resume_with_kind(&content));
        } else if self.phase().is_paused() {
            self.cancel_alert(now);
            self.mirror_call(now, |m| m.pause());
        }

        info!(phase = %report.phase, remaining = ?report.remaining_secs, "resynchronized from background");
        self.emit_state_changed(now);
        report
    }

    /// Retry writes that failed earlier: session records, then task credits,
    /// then reward unlocks. Stops at the first failure and keeps that write
    /// and the rest for the next attempt. Returns how many writes landed.
    pub fn retry_pending_saves(&mut self) -> Result<usize, PersistenceError> {
        let mut flushed = 0;

        let mut records = std::mem::take(&mut self.unsaved).into_iter();
        while let Some(record) = records.next() {
            if let Err(e) = self.collab.store.save(&record) {
                error!(session_id = %record.id, error = %e, "retrying save failed");
                self.unsaved.push(record);
                self.unsaved.extend(records);
                return Err(e);
            }
            flushed += 1;
        }

        let mut credits = std::mem::take(&mut self.pending_credits).into_iter();
        while let Some(credit) = credits.next() {
            if let Err(e) = self.collab.store.mark_task_completed(&credit.task, credit.minutes) {
                error!(session_id = %credit.session_id, task = %credit.task, error = %e, "retrying task credit failed");
                self.pending_credits.push(credit);
                self.pending_credits.extend(credits);
                return Err(e);
            }
            flushed += 1;
        }

        let mut unlocks = std::mem::take(&mut self.pending_unlocks).into_iter();
        while let Some(unlock) = unlocks.next() {
            if let Err(e) = self
                .collab
                .rewards
                .record_reward_unlocked(&unlock.reward_id, unlock.session_id)
            {
                error!(session_id = %unlock.session_id, error = %e, "retrying reward unlock failed");
                self.pending_unlocks.push(unlock);
                self.pending_unlocks.extend(unlocks);
                return Err(e);
            }
            flushed += 1;
            info!(session_id = %unlock.session_id, reward_id = %unlock.reward_id, "reward unlocked");
            let at = self.clock.now();
            self.emit(Event::RewardUnlocked {
                reward_id: unlock.reward_id,
                session_id: unlock.session_id,
                at,
            });
        }

        if flushed > 0 {
            info!(flushed, "pending writes flushed");
        }
        Ok(flushed)
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Settle every natural completion due at `now`. A break that expired
    /// hands back to its parked focus at the break's planned end, which may
    /// itself have expired since.
    fn catch_up(&mut self, now: DateTime<Utc>) -> usize {
        let mut completions = 0;
        loop {
            let (mut active, anchor, parked) = match std::mem::take(&mut self.state) {
                EngineState::Running {
                    active,
                    anchor,
                    parked_focus,
                } if anchor.has_elapsed(now) => (active, anchor, parked_focus),
                other => {
                    self.state = other;
                    break;
                }
            };

            let at = anchor.planned_end;
            freeze(&mut active, &anchor, at);
            match active.kind {
                SessionKind::Break => self.finish_break(active, parked, at, now, true),
                SessionKind::Focus => {
                    if let Some(orphan) = parked {
                        // Unreachable through commands; keep the record rather than drop it.
                        warn!(session_id = %orphan.id, "focus parked behind a focus session");
                        self.persist(&orphan, at);
                    }
                    self.complete_focus(active, at, true);
                }
            }
            completions += 1;
        }
        completions
    }

    /// Move a running or paused break out of the state, leaving `Idle` behind.
    /// Returns `None` (state untouched) if the active session is not a break.
    fn take_break(&mut self, now: DateTime<Utc>) -> Option<(SessionRecord, Option<SessionRecord>)> {
        match std::mem::take(&mut self.state) {
            EngineState::Running {
                mut active,
                anchor,
                parked_focus,
            } if active.kind == SessionKind::Break => {
                freeze(&mut active, &anchor, now);
                Some((active, parked_focus))
            }
            EngineState::Paused {
                active,
                parked_focus,
            } if active.kind == SessionKind::Break => Some((active, parked_focus)),
            other => {
                self.state = other;
                None
            }
        }
    }

    fn finish_break(
        &mut self,
        mut record: SessionRecord,
        parked: Option<SessionRecord>,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
        natural: bool,
    ) {
        record.finish(at, true);
        info!(
            break_id = %record.id,
            actual_secs = record.actual_duration,
            natural,
            "break finished"
        );
        self.persist(&record, at);

        let resumed_focus_id = match parked {
            Some(mut focus) => {
                focus.accrue_break(record.actual_duration);
                let remaining_secs = focus.remaining();
                let anchor = WallAnchor::starting(at, remaining_secs);
                let live_remaining = anchor.remaining(now);
                self.reschedule_alert(SessionKind::Focus, anchor.planned_end, now);
                let content = self.mirror_content(&focus, live_remaining, false);
                self.mirror_call(now, |m| m.resume_with_kind(&content));
                self.last_remaining = Some(live_remaining);
                let id = focus.id;
                self.state = EngineState::Running {
                    active: focus,
                    anchor,
                    parked_focus: None,
                };
                Some(id)
            }
            None => {
                self.cancel_alert(now);
                self.end_mirror(record.id, true, now);
                self.last_remaining = None;
                self.state = EngineState::Idle;
                None
            }
        };

        self.emit(Event::BreakEnded {
            break_id: record.id,
            actual_secs: record.actual_duration,
            natural,
            resumed_focus_id,
            at,
        });
        self.emit_state_changed(now);
    }

    fn complete_focus(&mut self, mut record: SessionRecord, at: DateTime<Utc>, natural: bool) {
        record.finish(at, true);
        info!(
            session_id = %record.id,
            actual_secs = record.actual_duration,
            break_secs = record.break_time_accrued,
            natural,
            "focus session completed"
        );
        self.cancel_alert(at);
        self.end_mirror(record.id, true, at);
        self.award(&record, at);

        if let Some(task) = record.task.clone() {
            let minutes = record.actual_duration / 60;
            if let Err(e) = self.collab.store.mark_task_completed(&task, minutes) {
                self.persistence_failed(Some(record.id), &e, at);
                // A task that no longer exists cannot be credited later either.
                if !matches!(e, PersistenceError::NotFound { .. }) {
                    self.pending_credits.push(PendingCredit {
                        task,
                        session_id: record.id,
                        minutes,
                    });
                }
            }
        }
        self.persist(&record, at);

        self.state = EngineState::Idle;
        self.focus_label = None;
        self.last_remaining = None;
        self.emit(Event::SessionCompleted {
            record,
            natural,
            at,
        });
        self.emit_state_changed(at);
    }

    /// Evaluate the reward policy at most once per session id.
    fn award(&mut self, record: &SessionRecord, at: DateTime<Utc>) {
        if !self.awarded.try_claim(record.id) {
            debug!(session_id = %record.id, "reward already evaluated");
            return;
        }

        let rewards = Arc::clone(&self.collab.rewards);
        let outcome = reward::evaluate(
            record.actual_duration,
            self.config.reward_threshold_secs,
            || rewards.draw_random_reward(),
        );
        match outcome {
            Ok(RewardOutcome::Awarded(reward_id)) => {
                if let Err(e) = rewards.record_reward_unlocked(&reward_id, record.id) {
                    self.persistence_failed(Some(record.id), &e, at);
                    warn!(session_id = %record.id, %reward_id, "reward unlock held for retry");
                    self.pending_unlocks.push(PendingUnlock {
                        reward_id,
                        session_id: record.id,
                    });
                    return;
                }
                info!(session_id = %record.id, %reward_id, "reward unlocked");
                self.emit(Event::RewardUnlocked {
                    reward_id,
                    session_id: record.id,
                    at,
                });
            }
            Ok(RewardOutcome::None) => {}
            Err(e) => self.persistence_failed(Some(record.id), &e, at),
        }
    }

    fn persist(&mut self, record: &SessionRecord, at: DateTime<Utc>) {
        if let Err(e) = self.collab.store.save(record) {
            self.persistence_failed(Some(record.id), &e, at);
            self.unsaved.retain(|r| r.id != record.id);
            self.unsaved.push(record.clone());
        }
    }

    fn persistence_failed(&mut self, session_id: Option<SessionId>, err: &PersistenceError, at: DateTime<Utc>) {
        error!(session_id = ?session_id, error = %err, "persistence failed");
        self.emit(Event::PersistenceFailed {
            session_id,
            message: err.to_string(),
            at,
        });
    }

    fn task_title(&mut self, task: &TaskId, now: DateTime<Utc>) -> Option<String> {
        match self.collab.store.fetch_task_by_id(task) {
            Ok(found) => found.map(|t| t.title),
            Err(e) => {
                self.persistence_failed(None, &e, now);
                None
            }
        }
    }

    fn mirror_content(&self, record: &SessionRecord, remaining_secs: i64, paused: bool) -> MirrorContent {
        MirrorContent {
            remaining_secs,
            total_planned_secs: record.planned_duration,
            kind: record.kind,
            label: match record.kind {
                SessionKind::Focus => self.focus_label.clone(),
                SessionKind::Break => None,
            },
            paused,
        }
    }

    /// Cancel the pending alert, then schedule a new one unless it would fire
    /// in the past.
    fn reschedule_alert(&mut self, kind: SessionKind, fire_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.cancel_alert(now);
        if fire_at <= now {
            return;
        }
        let label = match kind {
            SessionKind::Focus => self.focus_label.clone(),
            SessionKind::Break => None,
        };
        let alert = CompletionAlert::new(kind, label, fire_at);
        self.notifier_call(now, |n| n.schedule_completion(&alert));
    }

    fn cancel_alert(&mut self, now: DateTime<Utc>) {
        self.notifier_call(now, |n| n.cancel_pending());
    }

    /// End the mirror at most once per session.
    fn end_mirror(&mut self, session_id: SessionId, completed: bool, now: DateTime<Utc>) {
        if self.mirror_ended_for == Some(session_id) {
            return;
        }
        self.mirror_ended_for = Some(session_id);
        self.mirror_call(now, |m| m.end(completed));
    }

    fn mirror_call<F>(&mut self, now: DateTime<Utc>, call: F)
    where
        F: FnOnce(&dyn StatusMirror) -> Result<(), AdapterError>,
    {
        let mirror = Arc::clone(&self.collab.mirror);
        if let Err(e) = call(mirror.as_ref()) {
            self.adapter_failed(e, now);
        }
    }

    fn notifier_call<F>(&mut self, now: DateTime<Utc>, call: F)
    where
        F: FnOnce(&dyn NotificationScheduler) -> Result<(), AdapterError>,
    {
        let notifier = Arc::clone(&self.collab.notifier);
        if let Err(e) = call(notifier.as_ref()) {
            self.adapter_failed(e, now);
        }
    }

    fn adapter_failed(&mut self, err: AdapterError, at: DateTime<Utc>) {
        warn!(adapter = err.adapter(), error = %err, "adapter call failed");
        self.emit(Event::AdapterFailed {
            adapter: err.adapter().to_string(),
            message: err.to_string(),
            at,
        });
    }

    fn reject(&self, command: Command) -> EngineError {
        let phase = self.phase();
        warn!(%command, %phase, "command rejected");
        EngineError::InvalidTransition { command, phase }
    }

    fn status_at(&self, now: DateTime<Utc>) -> StateSnapshot {
        let (record, remaining_secs, actual_secs) = match &self.state {
            EngineState::Idle => (None, 0, 0),
            EngineState::Running { active, anchor, .. } => {
                let remaining = anchor.remaining(now);
                let actual = (active.planned_duration - remaining).max(active.actual_duration);
                (Some(active), remaining, actual)
            }
            EngineState::Paused { active, .. } => (Some(active), active.remaining(), active.actual_duration),
            EngineState::AwaitingCompletionConfirmation { pending } => {
                (Some(pending), pending.remaining(), pending.actual_duration)
            }
        };
        StateSnapshot {
            phase: self.phase(),
            session_id: record.map(|r| r.id),
            kind: record.map(|r| r.kind),
            label: record.and_then(|r| match r.kind {
                SessionKind::Focus => self.focus_label.clone(),
                SessionKind::Break => None,
            }),
            remaining_secs,
            planned_secs: record.map(|r| r.planned_duration).unwrap_or(0),
            actual_secs,
            parked_focus_remaining_secs: self.state.parked_focus().map(|f| f.remaining()),
            at: now,
        }
    }

    fn emit_state_changed(&mut self, now: DateTime<Utc>) {
        let snapshot = self.status_at(now);
        self.emit(Event::StateChanged { snapshot });
    }

    fn emit(&mut self, event: Event) {
        for listener in &self.listeners {
            listener(&event);
        }
        if self.events.len() >= EVENT_BUFFER_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

fn validate_duration(seconds: i64) -> Result<(), EngineError> {
    if seconds <= 0 {
        warn!(seconds, "rejected non-positive duration");
        return Err(EngineError::InvalidDuration { seconds });
    }
    Ok(())
}

/// Bring `actual_duration` up to date with the anchor at `at`.
fn freeze(record: &mut SessionRecord, anchor: &WallAnchor, at: DateTime<Utc>) {
    record.record_elapsed(record.planned_duration - anchor.remaining(at));
}
