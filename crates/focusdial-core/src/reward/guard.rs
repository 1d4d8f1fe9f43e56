use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

pub const DEFAULT_AWARD_GUARD_CAPACITY: usize = 50;

/// Remembers which sessions have already had their reward evaluated.
///
/// Bounded: once more than `capacity` ids are held, the oldest is evicted.
/// The window only needs to cover racing completion paths on recent sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardGuard {
    capacity: usize,
    order: VecDeque<SessionId>,
    #[serde(skip)]
    seen: HashSet<SessionId>,
}

impl AwardGuard {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Returns `true` the first time `id` is claimed, `false` afterwards.
    pub fn try_claim(&mut self, id: SessionId) -> bool {
        if self.seen.is_empty() && !self.order.is_empty() {
            self.reindex();
        }
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.order.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // `seen` is not serialized; rebuild it after a restore.
    fn reindex(&mut self) {
        self.seen = self.order.iter().copied().collect();
    }
}

impl Default for AwardGuard {
    fn default() -> Self {
        Self::new(DEFAULT_AWARD_GUARD_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_rejected() {
        let mut guard = AwardGuard::default();
        let id = SessionId::new();
        assert!(guard.try_claim(id));
        assert!(!guard.try_claim(id));
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut guard = AwardGuard::new(3);
        let ids: Vec<SessionId> = (0..4).map(|_| SessionId::new()).collect();
        for id in &ids {
            assert!(guard.try_claim(*id));
        }
        assert_eq!(guard.len(), 3);
        assert!(!guard.contains(&ids[0]));
        assert!(guard.contains(&ids[3]));
        // Evicted ids can be claimed again; recent ones cannot.
        assert!(!guard.try_claim(ids[3]));
        assert!(guard.try_claim(ids[0]));
    }

    #[test]
    fn survives_serde_round_trip() {
        let mut guard = AwardGuard::new(5);
        let id = SessionId::new();
        guard.try_claim(id);
        let json = serde_json::to_string(&guard).unwrap();
        let mut restored: AwardGuard = serde_json::from_str(&json).unwrap();
        assert!(!restored.try_claim(id));
        assert_eq!(restored.len(), 1);
    }
}
