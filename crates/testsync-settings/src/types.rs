//! Settings type definitions.
//!
//! Field names are snake_case to match `configuration.json`. Every struct is
//! `#[serde(default)]`, so a partial file only overrides what it names.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use testsync_core::AttachPolicy;

use crate::errors::{Result, SettingsError};

/// Longest accepted `sessions.retention_secs` (30 days).
pub const MAX_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;

/// Longest accepted `sessions.resume_delay_ms` (one hour).
pub const MAX_RESUME_DELAY_MS: u64 = 60 * 60 * 1000;

/// Root settings type.
///
/// ```json
/// {
///   "server": { "api_port": 9104, "ws_port": 9105 },
///   "logging": { "level": "info", "dir": "/var/log/testsync" },
///   "sync_client": { "username": "loadero", "password": "secret" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub server: ServerSettings,
    pub sessions: SessionSettings,
    pub logging: LoggingSettings,
    pub sync_client: SyncClientSettings,
}

/// Listener and request limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    /// Port of the HTTP session API.
    pub api_port: u16,
    /// Port of the WebSocket listener.
    pub ws_port: u16,
    pub request_timeout_secs: u64,
    /// Largest accepted session payload on create.
    pub max_body_bytes: usize,
    /// Largest accepted inbound WebSocket message.
    pub max_message_size: usize,
    /// Outbound frames buffered per connection before sends start failing.
    pub send_queue_capacity: usize,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            api_port: 9104,
            ws_port: 9105,
            request_timeout_secs: 10,
            max_body_bytes: 10 * 1024 * 1024,
            max_message_size: 16 * 1024 * 1024,
            send_queue_capacity: 256,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Session lifetime and checkpoint behaviour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Age after which a session is evicted.
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub attach_policy: AttachPolicy,
    /// Gap between a checkpoint release and the advertised resume time.
    pub resume_delay_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            retention_secs: 12 * 60 * 60,
            sweep_interval_secs: 12 * 60 * 60,
            attach_policy: AttachPolicy::Create,
            resume_delay_ms: 1000,
        }
    }
}

impl SessionSettings {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Directory for `test-sync.log`. Logs go to stderr when unset.
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            dir: None,
            json: false,
        }
    }
}

/// Credentials the load-test workers present on the HTTP API.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncClientSettings {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SyncClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClientSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl SyncSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sessions.retention_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.retention_secs must be positive".into(),
            ));
        }
        if self.sessions.retention_secs > MAX_RETENTION_SECS {
            return Err(SettingsError::InvalidValue(format!(
                "sessions.retention_secs must be at most {MAX_RETENTION_SECS}"
            )));
        }
        if self.sessions.resume_delay_ms > MAX_RESUME_DELAY_MS {
            return Err(SettingsError::InvalidValue(format!(
                "sessions.resume_delay_ms must be at most {MAX_RESUME_DELAY_MS}"
            )));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.sweep_interval_secs must be positive".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.send_queue_capacity must be positive".into(),
            ));
        }
        if self.server.api_port != 0 && self.server.api_port == self.server.ws_port {
            return Err(SettingsError::InvalidValue(format!(
                "server.api_port and server.ws_port are both {}",
                self.server.api_port
            )));
        }
        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(SettingsError::InvalidValue(format!(
                "unknown logging.level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_deployment() {
        let s = SyncSettings::default();
        assert_eq!(s.server.api_port, 9104);
        assert_eq!(s.server.ws_port, 9105);
        assert_eq!(s.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(s.sessions.retention(), Duration::from_secs(43_200));
        assert_eq!(s.sessions.sweep_interval(), Duration::from_secs(43_200));
        assert_eq!(s.sessions.attach_policy, AttachPolicy::Create);
        assert_eq!(s.logging.level, "info");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let raw = r#"{"server":{"ws_port":7000},"sync_client":{"username":"u"}}"#;
        let s: SyncSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(s.server.ws_port, 7000);
        assert_eq!(s.server.api_port, 9104);
        assert_eq!(s.sync_client.username, "u");
        assert_eq!(s.sync_client.password, "");
    }

    #[test]
    fn debug_redacts_password() {
        let creds = SyncClientSettings {
            username: "u".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn validate_rejects_zero_retention() {
        let mut s = SyncSettings::default();
        s.sessions.retention_secs = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_bounds_retention() {
        let mut s = SyncSettings::default();
        s.sessions.retention_secs = MAX_RETENTION_SECS;
        assert!(s.validate().is_ok());
        s.sessions.retention_secs = 1_000_000_000_000_000;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_bounds_resume_delay() {
        let mut s = SyncSettings::default();
        s.sessions.resume_delay_ms = 0;
        assert!(s.validate().is_ok());
        s.sessions.resume_delay_ms = MAX_RESUME_DELAY_MS;
        assert!(s.validate().is_ok());
        s.sessions.resume_delay_ms = 9_000_000_000_000_000;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_shared_port() {
        let mut s = SyncSettings::default();
        s.server.ws_port = s.server.api_port;
        assert!(s.validate().is_err());

        s.server.api_port = 0;
        s.server.ws_port = 0;
        assert!(s.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_level() {
        let mut s = SyncSettings::default();
        s.logging.level = "loud".into();
        assert!(s.validate().is_err());
        s.logging.level = "DEBUG".into();
        assert!(s.validate().is_ok());
    }
}
