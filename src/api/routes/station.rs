//! Station Routes
//!
//! - GET /api/station - Current station state
//! - POST /api/station/data - Producer update (merge, then broadcast)

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use std::sync::Arc;

use crate::api::dto::ApiResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::station::{DeviceState, StationUpdate};

/// GET /api/station
pub async fn get_station(State(state): State<Arc<AppState>>) -> Json<ApiResponse<DeviceState>> {
    Json(ApiResponse::ok(state.store.get().await))
}

/// POST /api/station/data
///
/// Merge a partial update from the device into the station state, then push
/// the resulting state to every connected dashboard. A rejected update
/// changes nothing and is not broadcast.
///
/// Merge and publish run in their own task: if the producer disconnects and
/// this handler is dropped, an accepted update is still broadcast.
pub async fn ingest_station_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StationUpdate>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<DeviceState>>> {
    let Json(update) = payload?;

    let task_state = Arc::clone(&state);
    let station = tokio::spawn(async move { merge_and_publish(&task_state, update).await })
        .await
        .map_err(|e| ApiError::Internal(format!("Ingest task failed: {}", e)))??;

    Ok(Json(ApiResponse::ok(station)))
}

async fn merge_and_publish(state: &AppState, update: StationUpdate) -> ApiResult<DeviceState> {
    let station = state.store.merge(update).await?;
    let delivered = state.ws_hub.publish(&station).await;

    tracing::info!(
        station_id = %station.id,
        status = %station.status,
        revision = station.revision,
        subscribers = delivered,
        "Station data received"
    );

    Ok(station)
}
