pub mod config;
pub mod history;
pub mod rewards;
pub mod task;
pub mod timer;
