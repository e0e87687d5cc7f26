//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use axum::http::StatusCode;
use journal_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failed schema migration at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps a port error onto the status code a handler should answer with.
pub fn port_status(error: &PortError) -> StatusCode {
    match error {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_http_statuses() {
        assert_eq!(port_status(&PortError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(port_status(&PortError::InvalidInput("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(port_status(&PortError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            port_status(&PortError::Unexpected("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
