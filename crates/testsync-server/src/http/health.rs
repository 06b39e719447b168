use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub sessions: usize,
    pub uptime_secs: u64,
}

/// Liveness probe. Not behind authentication.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok".into(),
        sessions: state.registry.len(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
