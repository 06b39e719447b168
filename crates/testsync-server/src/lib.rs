//! Network surface of the test sync service: the authenticated HTTP session
//! API and the WebSocket listener that binds workers to sessions.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ApiError;
pub use server::{AppState, ServerHandle, SyncServer};
pub use shutdown::ShutdownCoordinator;
