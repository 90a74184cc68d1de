//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{ApiConfig, Config};
use crate::station::StateStore;
use crate::websocket::{ConnectionHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// The station's current state
    pub store: Arc<StateStore>,
    /// WebSocket connection hub for real-time streaming
    pub ws_hub: Arc<ConnectionHub>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create AppState from the full service configuration
    pub fn new(config: &Config) -> Self {
        Self::with_components(
            Arc::new(StateStore::new(
                config.station.id.clone(),
                config.station.name.clone(),
            )),
            Arc::new(ConnectionHub::new(config.hub.clone())),
            config.api.clone(),
        )
    }

    /// Create AppState around existing components
    pub fn with_components(
        store: Arc<StateStore>,
        ws_hub: Arc<ConnectionHub>,
        config: ApiConfig,
    ) -> Self {
        Self {
            store,
            ws_hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Create AppState with custom WebSocket hub configuration
    pub fn with_ws_config(config: ApiConfig, hub_config: HubConfig) -> Self {
        Self::with_components(
            Arc::new(StateStore::default()),
            Arc::new(ConnectionHub::new(hub_config)),
            config,
        )
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.ws_hub.connection_count().await
    }
}
