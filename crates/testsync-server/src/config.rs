//! Server configuration.

use std::time::Duration;

use testsync_core::AttachPolicy;
use testsync_settings::SyncSettings;

use crate::auth::Credentials;

/// Runtime configuration for [`crate::SyncServer`].
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind both listeners on.
    pub host: String,
    /// HTTP API port (`0` for auto-assign).
    pub api_port: u16,
    /// WebSocket port (`0` for auto-assign).
    pub ws_port: u16,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_message_size: usize,
    /// Per-connection outbound queue depth.
    pub send_queue_capacity: usize,
    pub attach_policy: AttachPolicy,
    pub resume_delay: Duration,
    pub sweep_interval: Duration,
    pub credentials: Credentials,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            api_port: 0,
            ws_port: 0,
            request_timeout: Duration::from_secs(10),
            max_body_bytes: 10 * 1024 * 1024,
            max_message_size: 16 * 1024 * 1024,
            send_queue_capacity: 256,
            attach_policy: AttachPolicy::Create,
            resume_delay: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(12 * 60 * 60),
            credentials: Credentials::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            api_port: settings.server.api_port,
            ws_port: settings.server.ws_port,
            request_timeout: settings.server.request_timeout(),
            max_body_bytes: settings.server.max_body_bytes,
            max_message_size: settings.server.max_message_size,
            send_queue_capacity: settings.server.send_queue_capacity,
            attach_policy: settings.sessions.attach_policy,
            resume_delay: settings.sessions.resume_delay(),
            sweep_interval: settings.sessions.sweep_interval(),
            credentials: Credentials::new(
                settings.sync_client.username.clone(),
                settings.sync_client.password.clone(),
            ),
        }
    }
}
