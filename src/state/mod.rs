// Persistent application state

pub mod config;
pub mod settings;

pub use config::ConfigManager;
pub use settings::{AppSettings, ShellSettings, UpdaterSettings};
