//! Test sync server: stores per-run payloads over HTTP and coordinates
//! checkpoint barriers between load-test workers over WebSocket.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use testsync_engine::SessionRegistry;
use testsync_server::{ServerConfig, ShutdownCoordinator, SyncServer};
use testsync_settings::{load_settings, SyncSettings};
use testsync_telemetry::{init_telemetry, parse_level, TelemetryConfig};
use tracing::info;

/// Test sync server.
#[derive(Parser, Debug)]
#[command(name = "testsync", about = "Checkpoint coordination for distributed test runs")]
struct Cli {
    /// Directory containing `configuration.json`.
    #[arg(short = 'c', long, default_value = "./config")]
    config_dir: PathBuf,

    /// HTTP API port (overrides settings).
    #[arg(long)]
    api_port: Option<u16>,

    /// WebSocket port (overrides settings).
    #[arg(long)]
    ws_port: Option<u16>,

    /// Log level (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut SyncSettings) {
        if let Some(port) = self.api_port {
            settings.server.api_port = port;
        }
        if let Some(port) = self.ws_port {
            settings.server.ws_port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

/// File and environment layers, then CLI flags, validated once at the end.
fn resolve_settings(cli: &Cli) -> Result<SyncSettings> {
    let mut settings = load_settings(&cli.config_dir).with_context(|| {
        format!("failed to load settings from {}", cli.config_dir.display())
    })?;
    cli.apply(&mut settings);
    settings.validate().context("invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = resolve_settings(&cli)?;

    let telemetry = init_telemetry(TelemetryConfig {
        log_level: parse_level(&settings.logging.level)?,
        module_levels: Vec::new(),
        json: settings.logging.json,
        log_dir: settings.logging.dir.clone(),
    })?;
    info!("Welcome to Test Sync");
    if let Some(path) = telemetry.log_path() {
        info!(path = %path.display(), "logging to file");
    }

    let registry = Arc::new(SessionRegistry::new(settings.sessions.retention()));
    let coordinator = ShutdownCoordinator::new(settings.server.shutdown_timeout());
    let handle = SyncServer::new(ServerConfig::from_settings(&settings), registry)
        .listen(coordinator.token())
        .await
        .context("failed to bind listeners")?;
    info!(
        api = %handle.api_addr,
        ws = %handle.ws_addr,
        attach_policy = %settings.sessions.attach_policy,
        "test sync server started"
    );

    wait_for_signal().await?;
    info!("shutdown signal received");

    let _ = coordinator.graceful_shutdown(handle.into_tasks()).await;
    info!("GOODBYE");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("failed to listen for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")
}
