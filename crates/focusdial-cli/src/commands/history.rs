use clap::Subcommand;
use focusdial_core::{Database, SessionKind};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List recorded sessions, most recent first
    List {
        /// Maximum number of sessions
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Only sessions of this kind (focus or break)
        #[arg(long)]
        kind: Option<SessionKind>,
    },
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        HistoryAction::List { limit, kind } => {
            let sessions: Vec<_> = db
                .list_sessions(limit)?
                .into_iter()
                .filter(|s| kind.map_or(true, |k| s.kind == k))
                .collect();
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
    }
    Ok(())
}
