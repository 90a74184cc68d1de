//! Health Routes
//!
//! - GET / - Service banner
//! - GET /health - Health status
//! - GET /health/live - Liveness probe (process is alive)

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::dto::{HealthResponse, InfoResponse};
use crate::api::state::AppState;

/// GET /
pub async fn service_info() -> Json<InfoResponse> {
    Json(InfoResponse {
        message: "VoltWay IoT API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
///
/// Always answers `OK` with the current server time.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        connections: state.ws_connection_count().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::websocket::HubConfig;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_connections() {
        let state = Arc::new(AppState::with_ws_config(
            ApiConfig::default(),
            HubConfig::default(),
        ));

        let Json(health) = health(State(state)).await;
        assert_eq!(health.status, "OK");
        assert_eq!(health.connections, 0);
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    }
}
