//! Data Transfer Objects
//!
//! Response types for the API endpoints. Request bodies for ingest are the
//! station's own `StationUpdate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// ENVELOPE
// ============================================

/// Successful response envelope: `{"success": true, "data": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always true
    pub success: bool,
    /// Payload
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failed response envelope: `{"success": false, "error": "..."}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    /// Human-readable reason
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

// ============================================
// SERVICE DTOs
// ============================================

/// Service banner returned at `/`
#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub message: String,
    pub version: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "OK" while the process is serving
    pub status: String,
    /// Time the check was answered
    pub timestamp: DateTime<Utc>,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Connected dashboards
    pub connections: usize,
    /// Application version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelopes() {
        let ok = serde_json::to_value(ApiResponse::ok(42)).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"], 42);

        let err = serde_json::to_value(ErrorResponse::new("Field 'id' is required")).unwrap();
        assert_eq!(err["success"], false);
        assert_eq!(err["error"], "Field 'id' is required");
    }
}
