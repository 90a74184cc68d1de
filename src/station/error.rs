//! Station error types

use thiserror::Error;

/// Errors that can occur while updating the station state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StationError {
    /// The producer update is missing required fields or carries bad values
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for station operations
pub type StationResult<T> = Result<T, StationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StationError::Validation("Field 'id' is required".to_string());
        assert_eq!(err.to_string(), "Validation error: Field 'id' is required");
    }
}
