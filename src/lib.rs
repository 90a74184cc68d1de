//! # VoltWay
//!
//! Real-time telemetry hub for an EV charging station. The device posts its
//! readings over HTTP; VoltWay keeps the latest state and pushes it live to
//! every connected dashboard over WebSocket.
//!
//! ## Modules
//!
//! - [`station`]: The station state record and its synchronized store
//! - [`websocket`]: Subscriber registry, broadcast hub and connection handling
//! - [`api`]: REST API server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use voltway::{serve, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     serve(AppState::new(&config), &config.api).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod station;
pub mod websocket;

// Re-export top-level types for convenience
pub use station::{DeviceState, StateStore, StationError, StationResult, StationStatus, StationUpdate};

pub use api::{build_router, serve, ApiError, AppState};

pub use websocket::{
    websocket_handler, ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage,
    SubscriberRegistry,
};

pub use config::{ApiConfig, Config, ConfigError, LogFormat, LoggingConfig, StationConfig};
