use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a collectible in the reward catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardId(pub String);

impl fmt::Display for RewardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RewardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reward_id", rename_all = "snake_case")]
pub enum RewardOutcome {
    Awarded(RewardId),
    None,
}

impl RewardOutcome {
    pub fn reward(&self) -> Option<&RewardId> {
        match self {
            RewardOutcome::Awarded(id) => Some(id),
            RewardOutcome::None => None,
        }
    }
}

/// Decide whether a finished focus session unlocks a reward.
///
/// A reward is awarded when `actual_focus_secs >= required_secs`. `draw` picks
/// the reward identity and is only called in that case.
pub fn evaluate<F, E>(actual_focus_secs: i64, required_secs: i64, draw: F) -> Result<RewardOutcome, E>
where
    F: FnOnce() -> Result<RewardId, E>,
{
    if actual_focus_secs >= required_secs {
        draw().map(RewardOutcome::Awarded)
    } else {
        Ok(RewardOutcome::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn fixed() -> Result<RewardId, Infallible> {
        Ok(RewardId::from("koi"))
    }

    #[test]
    fn threshold_boundary() {
        assert_eq!(evaluate(1499, 1500, fixed).unwrap(), RewardOutcome::None);
        assert_eq!(
            evaluate(1500, 1500, fixed).unwrap(),
            RewardOutcome::Awarded(RewardId::from("koi"))
        );
        assert_eq!(evaluate(1499, 1500, fixed).unwrap().reward(), None);
        assert_eq!(
            evaluate(1500, 1500, fixed).unwrap().reward(),
            Some(&RewardId::from("koi"))
        );
    }

    #[test]
    fn draw_is_skipped_below_threshold() {
        let mut drawn = false;
        let outcome = evaluate::<_, Infallible>(10, 20, || {
            drawn = true;
            Ok(RewardId::from("fern"))
        })
        .unwrap();
        assert_eq!(outcome, RewardOutcome::None);
        assert!(!drawn);
    }

    #[test]
    fn draw_failure_propagates() {
        let result = evaluate(30, 20, || Err::<RewardId, _>("catalog offline"));
        assert_eq!(result, Err("catalog offline"));
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(RewardOutcome::Awarded(RewardId::from("lantern"))).unwrap();
        assert_eq!(json["outcome"], "awarded");
        assert_eq!(json["reward_id"], "lantern");
    }
}
