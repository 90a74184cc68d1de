//! Charging Station State
//!
//! Holds the one authoritative record of the station's current state.
//!
//! - **types**: `DeviceState`, `StationStatus`, and the partial `StationUpdate`
//! - **store**: `StateStore`, the synchronized owner of the record
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use voltway::station::{StateStore, StationStatus, StationUpdate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = StateStore::new("ESP32_001", "VoltWay Station");
//!
//!     let update = StationUpdate::new("ESP32_001", StationStatus::Charging).battery_level(42.0);
//!     let state = store.merge(update).await?;
//!
//!     assert_eq!(state.battery_level, 42.0);
//!     assert_eq!(store.get().await, state);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{StationError, StationResult};
pub use store::StateStore;
pub use types::{DeviceState, StationStatus, StationUpdate};
