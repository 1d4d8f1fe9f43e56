//! Task management commands for CLI.

use clap::Subcommand;
use focusdial_core::Database;

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Add {
        /// Task title
        title: String,
    },
    /// List tasks
    List,
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        TaskAction::Add { title } => {
            if title.trim().is_empty() {
                return Err("task title must not be empty".into());
            }
            let task = db.insert_task(title.trim())?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List => {
            let tasks = db.list_tasks()?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
    }
    Ok(())
}
