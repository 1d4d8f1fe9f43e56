use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::RewardId;

/// Fixed, finite set of collectibles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCatalog {
    rewards: Vec<RewardId>,
}

impl RewardCatalog {
    /// Duplicate ids are dropped so the draw stays uniform over distinct rewards.
    pub fn new(rewards: Vec<RewardId>) -> Self {
        let mut seen = HashSet::new();
        let rewards = rewards
            .into_iter()
            .filter(|r| seen.insert(r.clone()))
            .collect();
        Self { rewards }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            names
                .into_iter()
                .map(|n| RewardId(n.as_ref().to_string()))
                .collect(),
        )
    }

    /// Uniform draw. `None` when the catalog is empty.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<RewardId> {
        self.rewards.choose(rng).cloned()
    }

    pub fn rewards(&self) -> &[RewardId] {
        &self.rewards
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn duplicates_are_dropped() {
        let catalog = RewardCatalog::from_names(["koi", "fern", "koi"]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn empty_catalog_draws_nothing() {
        let catalog = RewardCatalog::new(Vec::new());
        assert!(catalog.draw(&mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn draws_come_from_catalog_and_cover_it() {
        let catalog = RewardCatalog::from_names(["fern", "koi", "lantern"]);
        let mut rng = StdRng::seed_from_u64(7);
        let drawn: HashSet<RewardId> = (0..200).filter_map(|_| catalog.draw(&mut rng)).collect();
        assert_eq!(drawn.len(), 3);
        assert!(drawn.iter().all(|r| catalog.rewards().contains(r)));
    }
}
