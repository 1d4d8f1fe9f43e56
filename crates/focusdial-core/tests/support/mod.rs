//! Shared harness for engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use focusdial_core::integrations::{MemoryStore, RecordingMirror, RecordingNotifier};
use focusdial_core::{
    Clock, Collaborators, EngineConfig, EngineSnapshot, Event, ManualClock, SessionEngine,
};

pub const FOCUS: i64 = 1500;
pub const BREAK: i64 = 300;

pub struct Harness {
    pub engine: SessionEngine,
    pub clock: ManualClock,
    pub mirror: Arc<RecordingMirror>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    /// Reward threshold equal to the default focus length.
    pub fn new() -> Self {
        Self::with_threshold(FOCUS)
    }

    pub fn with_threshold(reward_threshold_secs: i64) -> Self {
        let clock = ManualClock::default();
        let mirror = Arc::new(RecordingMirror::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let store = Arc::new(MemoryStore::default());
        let config = EngineConfig {
            reward_threshold_secs,
            ..EngineConfig::default()
        };
        let engine = SessionEngine::new(
            config,
            Arc::new(clock.clone()),
            Collaborators::new(mirror.clone(), notifier.clone(), store.clone()),
        );
        Self {
            engine,
            clock,
            mirror,
            notifier,
            store,
        }
    }

    /// Rebuild the engine from a JSON round trip of its snapshot, keeping the
    /// same clock and collaborators.
    pub fn restart(&mut self) {
        let json = serde_json::to_string(&self.engine.snapshot()).unwrap();
        let snapshot: EngineSnapshot = serde_json::from_str(&json).unwrap();
        self.engine = SessionEngine::restore(
            snapshot,
            *self.engine.config(),
            Arc::new(self.clock.clone()),
            Collaborators::new(self.mirror.clone(), self.notifier.clone(), self.store.clone()),
        );
    }

    /// Advance one second at a time, ticking after each step.
    pub fn run_ticks(&mut self, seconds: i64) {
        for _ in 0..seconds {
            self.clock.advance_secs(1);
            self.engine.tick(self.clock.now());
        }
    }

    pub fn events_named(&mut self, name: &str) -> Vec<Event> {
        self.engine
            .drain_events()
            .into_iter()
            .filter(|e| e.name() == name)
            .collect()
    }
}
