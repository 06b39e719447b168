//! HTTP session API handlers.

pub mod health;
pub mod runs;

/// Body of `GET /` on the API listener.
pub const API_GREETING: &str = "A random proverb that is very intellectual.\n";

pub async fn greeting() -> &'static str {
    API_GREETING
}
