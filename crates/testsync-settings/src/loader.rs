//! Settings loading.
//!
//! Layers, lowest priority first:
//! 1. [`SyncSettings::default()`]
//! 2. `<config_dir>/configuration.json`, deep-merged over the defaults
//! 3. `TESTSYNC_*` environment variables
//!
//! Nothing here validates the result. Callers apply their own overrides first
//! and then call [`SyncSettings::validate`].

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SyncSettings;

/// File looked up inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "configuration.json";

/// Load settings from `<config_dir>/configuration.json` plus the environment.
pub fn load_settings(config_dir: &Path) -> Result<SyncSettings> {
    load_settings_from_path(&config_dir.join(CONFIG_FILE_NAME))
}

/// Load settings from an explicit file path plus the environment.
///
/// A missing file yields defaults. A file that is present but unreadable or
/// not valid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SyncSettings> {
    let mut settings = read_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<SyncSettings> {
    let defaults = serde_json::to_value(SyncSettings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading configuration file");
        let content = std::fs::read_to_string(path)?;
        let file: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, file)
    } else {
        debug!(?path, "configuration file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Merge `overlay` into `base`.
///
/// Objects merge key by key. Anything else in `overlay` replaces the value in
/// `base`, except `null`, which leaves `base` alone.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                let merged = match base_map.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply `TESTSYNC_*` overrides read through `lookup`.
///
/// Values that fail to parse are logged and skipped, leaving the file or
/// default value in place.
pub fn apply_overrides<F>(settings: &mut SyncSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.string("TESTSYNC_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.port("TESTSYNC_API_PORT") {
        settings.server.api_port = v;
    }
    if let Some(v) = env.port("TESTSYNC_WS_PORT") {
        settings.server.ws_port = v;
    }
    if let Some(v) = env.string("TESTSYNC_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("TESTSYNC_LOG_DIR") {
        settings.logging.dir = Some(v.into());
    }
    if let Some(v) = env.flag("TESTSYNC_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = env.string("TESTSYNC_SYNC_USERNAME") {
        settings.sync_client.username = v;
    }
    if let Some(v) = env.string("TESTSYNC_SYNC_PASSWORD") {
        settings.sync_client.password = v;
    }
    if let Some(v) = env.parsed("TESTSYNC_ATTACH_POLICY") {
        settings.sessions.attach_policy = v;
    }
    if let Some(v) = env.parsed::<u64>("TESTSYNC_RETENTION_SECS").filter(|n| *n > 0) {
        settings.sessions.retention_secs = v;
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn port(&self, name: &str) -> Option<u16> {
        let raw = self.string(name)?;
        let parsed = parse_port(&raw);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid port in environment, ignoring");
        }
        parsed
    }

    fn flag(&self, name: &str) -> Option<bool> {
        let raw = self.string(name)?;
        let parsed = parse_bool(&raw);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid boolean in environment, ignoring");
        }
        parsed
    }

    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.string(name)?;
        let parsed = raw.trim().parse().ok();
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid value in environment, ignoring");
        }
        parsed
    }
}

/// Accepts `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a listening port. `0` asks the OS for an ephemeral port.
pub fn parse_port(val: &str) -> Option<u16> {
    val.trim().parse().ok()
}
