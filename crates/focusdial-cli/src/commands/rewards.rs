use clap::Subcommand;
use focusdial_core::{Config, Database};
use serde_json::json;

#[derive(Subcommand)]
pub enum RewardsAction {
    /// List unlocked rewards alongside the catalog
    List,
}

pub fn run(action: RewardsAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?.with_catalog(config.reward_catalog());
    match action {
        RewardsAction::List => {
            let output = json!({
                "catalog": db.catalog().rewards(),
                "unlocked": db.list_reward_unlocks()?,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
