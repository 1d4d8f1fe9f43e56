//! Async tick driver.
//!
//! The engine itself is synchronous. Hosts that run under tokio share it
//! behind an async mutex; the ticker and foreground resync both take that
//! lock, so they never evaluate the same state concurrently.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::engine::{SessionEngine, TickReport};

pub type SharedEngine = Arc<Mutex<SessionEngine>>;

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

pub fn shared(engine: SessionEngine) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Tick the engine every `period` until it is no longer running.
///
/// Ticks missed while the process was suspended are skipped, not replayed;
/// the anchor already accounts for the gap.
pub fn spawn_ticker(engine: SharedEngine, period: Duration) -> JoinHandle<()> {
    spawn_ticker_with(engine, period, |_, _| {})
}

/// Like [`spawn_ticker`], calling `after_tick` with the engine still locked
/// after every tick. Hosts use it to persist a snapshot as soon as a
/// completion settles.
pub fn spawn_ticker_with<F>(engine: SharedEngine, period: Duration, mut after_tick: F) -> JoinHandle<()>
where
    F: FnMut(&SessionEngine, &TickReport) + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;

            let report = {
                let mut guard = engine.lock().await;
                if !guard.phase().is_running() {
                    break;
                }
                let now = guard.clock().now();
                let report = guard.tick(now);
                after_tick(&guard, &report);
                report
            };

            if !report.phase.is_running() {
                debug!(phase = %report.phase, "ticker stopped");
                break;
            }
        }
    })
}

/// Foreground re-entry. Takes the same lock as the ticker.
pub async fn resync(engine: &SharedEngine) -> TickReport {
    engine.lock().await.resync_from_background()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::integrations::{Collaborators, MemoryStore, RecordingMirror, RecordingNotifier};
    use crate::timer::{EngineConfig, EnginePhase};

    fn engine(clock: &ManualClock) -> (SharedEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let collab = Collaborators::new(
            Arc::new(RecordingMirror::new()),
            Arc::new(RecordingNotifier::new()),
            store.clone(),
        );
        let engine = SessionEngine::new(EngineConfig::default(), Arc::new(clock.clone()), collab);
        (shared(engine), store)
    }

    #[tokio::test]
    async fn ticker_exits_when_idle() {
        let clock = ManualClock::default();
        let (engine, _) = engine(&clock);
        let handle = spawn_ticker(engine.clone(), Duration::from_millis(5));
        handle.await.unwrap();
        assert_eq!(engine.lock().await.phase(), EnginePhase::Idle);
    }

    #[tokio::test]
    async fn ticker_settles_expired_session_and_stops() {
        let clock = ManualClock::default();
        let (engine, store) = engine(&clock);
        engine.lock().await.start(90, None).unwrap();
        clock.advance_secs(120);

        let handle = spawn_ticker(engine.clone(), Duration::from_millis(5));
        handle.await.unwrap();

        assert_eq!(engine.lock().await.phase(), EnginePhase::Idle);
        let saved = store.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].actual_duration, 90);
    }

    #[tokio::test]
    async fn after_tick_sees_settled_completion() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let clock = ManualClock::default();
        let (engine, _) = engine(&clock);
        engine.lock().await.start(90, None).unwrap();
        clock.advance_secs(120);

        let settled = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&settled);
        let handle = spawn_ticker_with(engine.clone(), Duration::from_millis(5), move |engine, report| {
            if report.completions > 0 {
                assert_eq!(engine.phase(), EnginePhase::Idle);
                assert_eq!(engine.snapshot().awarded.len(), 1);
                seen.fetch_add(report.completions, Ordering::SeqCst);
            }
        });
        handle.await.unwrap();
        assert_eq!(settled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resync_is_idempotent() {
        let clock = ManualClock::default();
        let (engine, _) = engine(&clock);
        engine.lock().await.start(1500, None).unwrap();
        clock.advance_secs(600);

        let first = resync(&engine).await;
        let second = resync(&engine).await;
        assert_eq!(first.remaining_secs, Some(900));
        assert_eq!(second.remaining_secs, first.remaining_secs);
        assert_eq!(second.phase, EnginePhase::RunningFocus);
        assert_eq!(second.completions, 0);
    }
}
