mod config;
pub mod database;

pub use config::{Config, LiveStatusConfig, NotificationsConfig, RewardsConfig, TimerConfig};
pub use database::{Database, RewardUnlock};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `FOCUSDIAL_DATA_DIR` wins outright. Otherwise `~/.config/focusdial[-dev]/`
/// based on FOCUSDIAL_ENV; set FOCUSDIAL_ENV=dev to use the development
/// directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSDIAL_DATA_DIR") {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSDIAL_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusdial-dev")
            } else {
                base_dir.join("focusdial")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
