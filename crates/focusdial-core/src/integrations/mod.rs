pub mod log;
pub mod memory;
pub mod traits;

use std::sync::Arc;

pub use log::{Disabled, LogNotificationScheduler, LogStatusMirror};
pub use memory::{MemoryStore, MirrorCall, NotifierCall, RecordingMirror, RecordingNotifier};
pub use traits::{
    CompletionAlert, MirrorContent, NotificationScheduler, RewardStore, SessionStore, StatusMirror,
    COMPLETION_ALERT_KEY,
};

/// Everything the engine calls outward to, injected at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub mirror: Arc<dyn StatusMirror>,
    pub notifier: Arc<dyn NotificationScheduler>,
    pub store: Arc<dyn SessionStore>,
    pub rewards: Arc<dyn RewardStore>,
}

impl Collaborators {
    /// Use one store for both sessions and rewards.
    pub fn new<S>(mirror: Arc<dyn StatusMirror>, notifier: Arc<dyn NotificationScheduler>, store: Arc<S>) -> Self
    where
        S: SessionStore + RewardStore + 'static,
    {
        Self {
            mirror,
            notifier,
            store: store.clone(),
            rewards: store,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
