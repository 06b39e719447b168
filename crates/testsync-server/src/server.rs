use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::{BoxError, Router};
use testsync_engine::{start_sweeper, Dispatcher, SessionRegistry};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::require_basic_auth;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::http::{self, health::health, runs};
use crate::websocket::{self, upgrade::register};

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub dispatcher: Dispatcher,
    pub config: Arc<ServerConfig>,
    pub shutdown: CancellationToken,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        registry: Arc<SessionRegistry>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(config.resume_delay),
            registry,
            config: Arc::new(config),
            shutdown,
            started_at: Instant::now(),
        }
    }
}

/// Routes served on the API port.
pub fn api_router(state: AppState) -> Router {
    let credentials = Arc::new(state.config.credentials.clone());
    let timeout = state.config.request_timeout;

    let run_routes = Router::new()
        .route("/runs/{id}", get(runs::read_run).post(runs::create_run))
        .route("/runs/{id}/", get(runs::read_run).post(runs::create_run))
        .route_layer(middleware::from_fn_with_state(credentials, require_basic_auth));

    let router = Router::new()
        .route("/", get(http::greeting))
        .route("/health", get(health))
        .merge(run_routes)
        .with_state(state);
    with_request_timeout(router, timeout).layer(TraceLayer::new_for_http())
}

/// Fail requests that run longer than `timeout` with a JSON 408.
fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(middleware_error))
            .layer(TimeoutLayer::new(timeout)),
    )
}

async fn middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        warn!("request timed out");
        ApiError::new(StatusCode::REQUEST_TIMEOUT, "Request timed out")
    } else {
        error!(error = %err, "unhandled middleware error");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// Routes served on the WebSocket port.
pub fn ws_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(websocket::greeting))
        .route("/register/{id}", get(register))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Both listeners plus the session sweeper.
pub struct SyncServer {
    config: ServerConfig,
    registry: Arc<SessionRegistry>,
}

impl SyncServer {
    pub fn new(config: ServerConfig, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }

    /// Bind both ports and spawn the serving tasks.
    ///
    /// Everything stops once `shutdown` is cancelled.
    pub async fn listen(self, shutdown: CancellationToken) -> std::io::Result<ServerHandle> {
        let host = self.config.host.clone();
        let api_listener = TcpListener::bind((host.as_str(), self.config.api_port)).await?;
        let ws_listener = TcpListener::bind((host.as_str(), self.config.ws_port)).await?;
        let api_addr = api_listener.local_addr()?;
        let ws_addr = ws_listener.local_addr()?;

        let sweep_interval = self.config.sweep_interval;
        let state = AppState::new(self.config, Arc::clone(&self.registry), shutdown.clone());

        let api = serve("api", api_listener, api_router(state.clone()), shutdown.clone());
        let ws = serve("websocket", ws_listener, ws_router(state), shutdown.clone());
        let sweeper = start_sweeper(self.registry, sweep_interval, shutdown);

        info!(%api_addr, %ws_addr, "listening");

        Ok(ServerHandle {
            api_addr,
            ws_addr,
            tasks: vec![api, ws, sweeper],
        })
    }
}

fn serve(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        match result {
            Ok(()) => info!(listener = name, "listener stopped"),
            Err(e) => error!(listener = name, error = %e, "listener failed"),
        }
    })
}

/// Handle returned by [`SyncServer::listen`].
pub struct ServerHandle {
    pub api_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Background tasks, for handing to the shutdown coordinator.
    pub fn into_tasks(self) -> Vec<JoinHandle<()>> {
        self.tasks
    }
}
