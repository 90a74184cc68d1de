//! State Store
//!
//! Owns the single current `DeviceState` behind Tokio's async RwLock.
//! `merge` validates, overlays and stamps under the write lock, so concurrent
//! producers never interleave field writes and readers only ever see a
//! complete pre- or post-merge snapshot.

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use super::error::StationResult;
use super::types::{DeviceState, StationUpdate};

/// Synchronized owner of the station's current state
#[derive(Debug)]
pub struct StateStore {
    state: RwLock<DeviceState>,
}

impl StateStore {
    /// Create a store holding the initial state for the given station
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::with_state(DeviceState::initial(id, name))
    }

    /// Create a store seeded with an explicit state
    pub fn with_state(state: DeviceState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Snapshot of the current state
    pub async fn get(&self) -> DeviceState {
        self.state.read().await.clone()
    }

    /// Validate `update` and overlay it onto the current state.
    ///
    /// On failure the stored state is not touched. On success `last_update`
    /// is stamped strictly after the previous stamp, `revision` advances by
    /// one, and the new state is returned.
    pub async fn merge(&self, update: StationUpdate) -> StationResult<DeviceState> {
        update.validate()?;

        let mut state = self.state.write().await;

        let mut next = state.clone();
        next.apply(&update);

        let now = Utc::now();
        next.last_update = if now > state.last_update {
            now
        } else {
            state.last_update + Duration::microseconds(1)
        };
        next.revision = state.revision + 1;

        *state = next.clone();

        tracing::debug!(
            station_id = %next.id,
            status = %next.status,
            revision = next.revision,
            "Station state merged"
        );

        Ok(next)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        let station = crate::config::StationConfig::default();
        Self::new(station.id, station.name)
    }
}
