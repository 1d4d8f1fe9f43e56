//! Collectible reward unlocks.
//!
//! - [`evaluate`]: threshold decision, drawing a reward only when it qualifies
//! - [`AwardGuard`]: at-most-once evaluation per session id
//! - [`RewardCatalog`]: fixed set of collectibles with a uniform draw

mod catalog;
mod guard;
mod policy;

pub use catalog::RewardCatalog;
pub use guard::{AwardGuard, DEFAULT_AWARD_GUARD_CAPACITY};
pub use policy::{evaluate, RewardId, RewardOutcome};
