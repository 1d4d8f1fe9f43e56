//! In-memory collaborators.
//!
//! These record every call they receive, which makes them the fakes of
//! choice for engine tests, and they can be switched into a failing mode to
//! exercise the error side channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::traits::{
    CompletionAlert, MirrorContent, NotificationScheduler, RewardStore, SessionStore, StatusMirror,
};
use crate::error::{AdapterError, PersistenceError};
use crate::reward::{RewardCatalog, RewardId};
use crate::session::{SessionId, SessionRecord, Task, TaskId};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorCall {
    Start(MirrorContent),
    Update(i64),
    Pause,
    Resume(MirrorContent),
    End { completed: bool },
}

#[derive(Debug, Default)]
pub struct RecordingMirror {
    calls: Mutex<Vec<MirrorCall>>,
    failing: AtomicBool,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (calls are still recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MirrorCall> {
        lock(&self.calls).clone()
    }

    pub fn last(&self) -> Option<MirrorCall> {
        lock(&self.calls).last().cloned()
    }

    pub fn end_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, MirrorCall::End { .. }))
            .count()
    }

    fn record(&self, call: MirrorCall) -> Result<(), AdapterError> {
        lock(&self.calls).push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::StatusMirror("surface unavailable".into()));
        }
        Ok(())
    }
}

impl StatusMirror for RecordingMirror {
    fn start(&self, content: &MirrorContent) -> Result<(), AdapterError> {
        self.record(MirrorCall::Start(content.clone()))
    }

    fn update(&self, remaining_secs: i64) -> Result<(), AdapterError> {
        self.record(MirrorCall::Update(remaining_secs))
    }

    fn pause(&self) -> Result<(), AdapterError> {
        self.record(MirrorCall::Pause)
    }

    fn resume_with_kind(&self, content: &MirrorContent) -> Result<(), AdapterError> {
        self.record(MirrorCall::Resume(content.clone()))
    }

    fn end(&self, completed: bool) -> Result<(), AdapterError> {
        self.record(MirrorCall::End { completed })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Schedule(CompletionAlert),
    Cancel,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    pending: Mutex<Option<CompletionAlert>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The alert that would currently fire, if any.
    pub fn pending(&self) -> Option<CompletionAlert> {
        lock(&self.pending).clone()
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        lock(&self.calls).clone()
    }

    pub fn schedule_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, NotifierCall::Schedule(_)))
            .count()
    }
}

impl NotificationScheduler for RecordingNotifier {
    fn schedule_completion(&self, alert: &CompletionAlert) -> Result<(), AdapterError> {
        lock(&self.calls).push(NotifierCall::Schedule(alert.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Notification("permission denied".into()));
        }
        *lock(&self.pending) = Some(alert.clone());
        Ok(())
    }

    fn cancel_pending(&self) -> Result<(), AdapterError> {
        lock(&self.calls).push(NotifierCall::Cancel);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AdapterError::Notification("permission denied".into()));
        }
        *lock(&self.pending) = None;
        Ok(())
    }
}

/// Session, task and reward storage held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    sessions: Mutex<Vec<SessionRecord>>,
    tasks: Mutex<HashMap<TaskId, Task>>,
    unlocks: Mutex<Vec<(RewardId, SessionId)>>,
    catalog: RewardCatalog,
    failing_saves: AtomicBool,
    failing_task_updates: AtomicBool,
    failing_unlocks: AtomicBool,
}

impl MemoryStore {
    pub fn new(catalog: RewardCatalog) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            tasks: Mutex::new(HashMap::new()),
            unlocks: Mutex::new(Vec::new()),
            catalog,
            failing_saves: AtomicBool::new(false),
            failing_task_updates: AtomicBool::new(false),
            failing_unlocks: AtomicBool::new(false),
        }
    }

    pub fn add_task(&self, id: &str, title: &str) -> TaskId {
        let task_id = TaskId::from(id);
        lock(&self.tasks).insert(
            task_id.clone(),
            Task {
                id: task_id.clone(),
                title: title.to_string(),
                completed: false,
                focus_minutes: 0,
            },
        );
        task_id
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        lock(&self.tasks).get(id).cloned()
    }

    /// Make `save` fail until switched back.
    pub fn set_failing_saves(&self, failing: bool) {
        self.failing_saves.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_task_updates(&self, failing: bool) {
        self.failing_task_updates.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_unlocks(&self, failing: bool) {
        self.failing_unlocks.store(failing, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<SessionRecord> {
        lock(&self.sessions).clone()
    }

    pub fn saved_by_id(&self, id: SessionId) -> Option<SessionRecord> {
        lock(&self.sessions).iter().find(|r| r.id == id).cloned()
    }

    pub fn unlocks(&self) -> Vec<(RewardId, SessionId)> {
        lock(&self.unlocks).clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(RewardCatalog::from_names(["fern", "koi", "lantern", "moth"]))
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, record: &SessionRecord) -> Result<(), PersistenceError> {
        if self.failing_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("store offline".into()));
        }
        let mut sessions = lock(&self.sessions);
        match sessions.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => sessions.push(record.clone()),
        }
        Ok(())
    }

    fn fetch_task_by_id(&self, id: &TaskId) -> Result<Option<Task>, PersistenceError> {
        Ok(lock(&self.tasks).get(id).cloned())
    }

    fn mark_task_completed(&self, id: &TaskId, additional_minutes: i64) -> Result<(), PersistenceError> {
        if self.failing_task_updates.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("store offline".into()));
        }
        let mut tasks = lock(&self.tasks);
        let task = tasks.get_mut(id).ok_or_else(|| PersistenceError::NotFound {
            entity: "task",
            id: id.to_string(),
        })?;
        task.completed = true;
        task.focus_minutes += additional_minutes.max(0);
        Ok(())
    }
}

impl RewardStore for MemoryStore {
    fn draw_random_reward(&self) -> Result<RewardId, PersistenceError> {
        self.catalog
            .draw(&mut rand::thread_rng())
            .ok_or(PersistenceError::EmptyCatalog)
    }

    fn record_reward_unlocked(
        &self,
        reward: &RewardId,
        from_session: SessionId,
    ) -> Result<(), PersistenceError> {
        if self.failing_unlocks.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("reward ledger offline".into()));
        }
        let mut unlocks = lock(&self.unlocks);
        if !unlocks.iter().any(|(_, s)| *s == from_session) {
            unlocks.push((reward.clone(), from_session));
        }
        Ok(())
    }
}
