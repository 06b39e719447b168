//! Service configuration: compiled defaults, a JSON file, and environment
//! variable overrides, in increasing priority.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, CONFIG_FILE_NAME};
pub use types::{
    LoggingSettings, ServerSettings, SessionSettings, SyncClientSettings, SyncSettings,
    MAX_RESUME_DELAY_MS, MAX_RETENTION_SECS,
};
