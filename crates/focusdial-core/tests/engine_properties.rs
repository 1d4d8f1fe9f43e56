//! Property tests over random command and time sequences.

mod support;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use focusdial_core::{Clock, Event, SessionId, SessionKind};
use proptest::prelude::*;

use support::{Harness, FOCUS};

#[derive(Debug, Clone)]
enum Op {
    Advance(i64),
    Tick,
    Pause,
    Resume,
    Break(i64),
    EndBreak,
    Stop,
    Confirm,
    Cancel,
    Resync,
    Start,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1i64..400).prop_map(Op::Advance),
        2 => Just(Op::Tick),
        1 => Just(Op::Pause),
        1 => Just(Op::Resume),
        1 => (1i64..300).prop_map(Op::Break),
        1 => Just(Op::EndBreak),
        1 => Just(Op::Stop),
        1 => Just(Op::Confirm),
        1 => Just(Op::Cancel),
        1 => Just(Op::Resync),
        1 => Just(Op::Start),
    ]
}

/// Ops that never pause or hold a session at the confirmation gate, so wall
/// time spent on a focus session is fully accounted for by focus and break.
fn unpaused_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1i64..400).prop_map(Op::Advance),
        2 => Just(Op::Tick),
        1 => (1i64..300).prop_map(Op::Break),
        1 => Just(Op::EndBreak),
        1 => Just(Op::Resync),
        1 => Just(Op::Start),
    ]
}

fn apply(h: &mut Harness, op: &Op) {
    // Rejected commands are expected in random sequences.
    let _ = match op {
        Op::Advance(secs) => {
            h.clock.advance_secs(*secs);
            Ok(h.engine.phase())
        }
        Op::Tick => Ok(h.engine.tick(h.clock.now()).phase),
        Op::Pause => h.engine.pause(),
        Op::Resume => h.engine.resume(),
        Op::Break(secs) => h.engine.start_break(*secs),
        Op::EndBreak => h.engine.end_break_early(),
        Op::Stop => h.engine.stop(),
        Op::Confirm => h.engine.confirm_completion(),
        Op::Cancel => h.engine.cancel_completion(),
        Op::Resync => Ok(h.engine.resync_from_background().phase),
        Op::Start => h.engine.start(FOCUS, None),
    };
}

/// Actual durations of every live record: active, parked, or pending.
fn live_actuals(h: &Harness) -> Vec<(SessionId, i64)> {
    let mut out = Vec::new();
    let status = h.engine.status();
    if let Some(id) = status.session_id {
        out.push((id, status.actual_secs));
    }
    if let Some(parked) = h.engine.state().parked_focus() {
        out.push((parked.id, parked.actual_duration));
    }
    out
}

proptest! {
    #[test]
    fn actual_duration_never_decreases(ops in prop::collection::vec(op(), 1..60)) {
        let mut h = Harness::new();
        h.engine.start(FOCUS, None).unwrap();
        let mut seen: HashMap<SessionId, i64> = HashMap::new();

        for op in &ops {
            apply(&mut h, op);
            for (id, actual) in live_actuals(&h) {
                let previous = seen.insert(id, actual).unwrap_or(0);
                prop_assert!(actual >= previous, "{id}: {previous} -> {actual} after {op:?}");
            }
        }

        for record in h.store.saved() {
            prop_assert!(record.actual_duration <= record.planned_duration);
            if let Some(last_seen) = seen.get(&record.id) {
                prop_assert!(record.actual_duration >= *last_seen);
            }
        }
    }

    #[test]
    fn wall_time_splits_into_focus_and_break(ops in prop::collection::vec(unpaused_op(), 1..60)) {
        let mut h = Harness::new();
        h.engine.start(FOCUS, None).unwrap();
        for op in &ops {
            apply(&mut h, op);
        }
        h.clock.advance_secs(10_000);
        h.engine.resync_from_background();

        let focus_records: Vec<_> = h
            .store
            .saved()
            .into_iter()
            .filter(|r| r.kind == SessionKind::Focus && r.is_completed)
            .collect();
        prop_assert!(!focus_records.is_empty());
        for record in focus_records {
            let wall = record.ended_at.unwrap() - record.started_at.unwrap();
            prop_assert_eq!(wall.num_seconds(), record.actual_duration + record.break_time_accrued);
        }
    }

    #[test]
    fn resync_is_idempotent(ops in prop::collection::vec(op(), 0..40)) {
        let mut h = Harness::new();
        h.engine.start(FOCUS, None).unwrap();
        for op in &ops {
            apply(&mut h, op);
        }

        let first = h.engine.resync_from_background();
        let saved = h.store.saved().len();
        let unlocks = h.store.unlocks().len();
        let second = h.engine.resync_from_background();

        prop_assert_eq!(first.phase, second.phase);
        prop_assert_eq!(first.remaining_secs, second.remaining_secs);
        prop_assert_eq!(second.completions, 0);
        prop_assert_eq!(h.store.saved().len(), saved);
        prop_assert_eq!(h.store.unlocks().len(), unlocks);
    }

    #[test]
    fn rewards_are_awarded_at_most_once_per_session(ops in prop::collection::vec(op(), 1..80)) {
        let mut h = Harness::with_threshold(60);
        let reward_events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reward_events);
        h.engine.subscribe(move |e| {
            if matches!(e, Event::RewardUnlocked { .. }) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        h.engine.start(FOCUS, None).unwrap();
        for op in &ops {
            apply(&mut h, op);
        }
        h.engine.resync_from_background();

        let unlocks = h.store.unlocks();
        let mut sessions: Vec<_> = unlocks.iter().map(|(_, s)| *s).collect();
        sessions.sort_by_key(|s| s.to_string());
        sessions.dedup();
        prop_assert_eq!(sessions.len(), unlocks.len());

        prop_assert_eq!(reward_events.load(Ordering::SeqCst), unlocks.len());
        for session in sessions {
            let record = h.store.saved_by_id(session).unwrap();
            prop_assert_eq!(record.kind, SessionKind::Focus);
            prop_assert!(record.is_completed);
        }
    }
}
