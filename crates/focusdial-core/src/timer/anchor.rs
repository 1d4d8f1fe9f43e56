//! Wall-time anchors.
//!
//! Remaining time is always recomputed from the anchor and the current wall
//! clock. Nothing here counts ticks, so a process that was suspended for an
//! hour sees the right value on its first tick after waking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Discrepancy, in seconds, above which a recomputed remaining value is
/// reported as a background correction rather than a normal tick.
pub const DEFAULT_DRIFT_THRESHOLD_SECS: i64 = 2;

/// Start and planned end of the current run segment.
///
/// A new anchor is taken on every start and resume. The planned end is
/// `start + remaining-at-segment-start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallAnchor {
    pub start: DateTime<Utc>,
    pub planned_end: DateTime<Utc>,
}

impl WallAnchor {
    /// Anchor a segment that begins at `now` with `remaining_secs` to run.
    pub fn starting(now: DateTime<Utc>, remaining_secs: i64) -> Self {
        Self {
            start: now,
            planned_end: now + Duration::seconds(remaining_secs.max(0)),
        }
    }

    /// Length of the segment in whole seconds.
    pub fn segment_secs(&self) -> i64 {
        (self.planned_end - self.start).num_seconds().max(0)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> i64 {
        remaining(self.start, self.planned_end, now)
    }

    /// Seconds of this segment already run at `now`.
    pub fn elapsed(&self, now: DateTime<Utc>) -> i64 {
        self.segment_secs() - self.remaining(now)
    }

    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        has_elapsed(self.planned_end, now)
    }
}

/// Seconds left until `planned_end`, clamped to `0..=segment length`.
///
/// Partial seconds round up, so the value only reaches zero once the planned
/// end has actually been reached.
pub fn remaining(start: DateTime<Utc>, planned_end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let segment_ms = (planned_end - start).num_milliseconds().max(0);
    let left_ms = (planned_end - now).num_milliseconds().clamp(0, segment_ms);
    (left_ms + 999) / 1000
}

pub fn has_elapsed(planned_end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= planned_end
}

/// Outcome of comparing a freshly recomputed remaining value with the last
/// one the engine reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// First observation of this segment.
    Fresh,
    /// Ordinary tick cadence.
    Steady,
    /// The value jumped by more than the threshold, e.g. after suspension.
    Correction { previous: i64, current: i64 },
}

pub fn detect_drift(previous: Option<i64>, current: i64, threshold_secs: i64) -> Drift {
    match previous {
        None => Drift::Fresh,
        Some(previous) if (previous - current).abs() > threshold_secs => {
            Drift::Correction { previous, current }
        }
        Some(_) => Drift::Steady,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn remaining_counts_down_from_anchor() {
        let anchor = WallAnchor::starting(t0(), 1500);
        assert_eq!(anchor.remaining(t0()), 1500);
        assert_eq!(anchor.remaining(t0() + Duration::seconds(100)), 1400);
        assert_eq!(anchor.elapsed(t0() + Duration::seconds(100)), 100);
    }

    #[test]
    fn remaining_clamps_after_planned_end() {
        let anchor = WallAnchor::starting(t0(), 60);
        assert_eq!(anchor.remaining(t0() + Duration::seconds(3600)), 0);
        assert_eq!(anchor.elapsed(t0() + Duration::seconds(3600)), 60);
        assert!(anchor.has_elapsed(t0() + Duration::seconds(60)));
        assert!(!anchor.has_elapsed(t0() + Duration::seconds(59)));
    }

    #[test]
    fn remaining_clamps_when_clock_is_behind_anchor() {
        let anchor = WallAnchor::starting(t0(), 60);
        assert_eq!(anchor.remaining(t0() - Duration::seconds(30)), 60);
    }

    #[test]
    fn partial_seconds_round_up() {
        let anchor = WallAnchor::starting(t0(), 10);
        assert_eq!(anchor.remaining(t0() + Duration::milliseconds(9_500)), 1);
        assert_eq!(anchor.remaining(t0() + Duration::milliseconds(10_000)), 0);
    }

    #[test]
    fn negative_remaining_is_treated_as_zero_length() {
        let anchor = WallAnchor::starting(t0(), -5);
        assert_eq!(anchor.segment_secs(), 0);
        assert!(anchor.has_elapsed(t0()));
    }

    #[test]
    fn drift_threshold() {
        assert_eq!(detect_drift(None, 100, 2), Drift::Fresh);
        assert_eq!(detect_drift(Some(101), 100, 2), Drift::Steady);
        assert_eq!(detect_drift(Some(102), 100, 2), Drift::Steady);
        assert_eq!(
            detect_drift(Some(103), 100, 2),
            Drift::Correction { previous: 103, current: 100 }
        );
        assert_eq!(
            detect_drift(Some(1400), 200, 2),
            Drift::Correction { previous: 1400, current: 200 }
        );
    }
}
