//! WebSocket listener: binds each upgraded connection to a session.

pub mod connection;
pub mod upgrade;

/// Body of `GET /` on the WebSocket listener.
pub const WS_GREETING: &str = "WebSocket, reporting for duty!\n";

pub async fn greeting() -> &'static str {
    WS_GREETING
}
