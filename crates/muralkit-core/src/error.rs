//! Error handling for MuralKit
//!
//! Provides the error taxonomy shared by every layer of the application:
//! - Parse errors (command stream headers, cancelled parses)
//! - Network errors (device HTTP endpoints)
//! - Telemetry errors (malformed status payloads)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Command stream parse error
///
/// Fatal to a single load operation. No partial model is ever installed
/// when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than two non-empty lines in the stream
    #[error("Command stream too short: expected at least 2 lines, found {lines}")]
    TooShort {
        /// Number of non-empty lines that were found.
        lines: usize,
    },

    /// Line 0 does not start with the total distance marker
    #[error("Command stream header missing: expected 'd<total>' on line 1, found '{found}'")]
    MissingDistanceHeader {
        /// The offending line.
        found: String,
    },

    /// Line 1 does not start with the height marker
    #[error("Command stream header missing: expected 'h<height>' on line 2, found '{found}'")]
    MissingHeightHeader {
        /// The offending line.
        found: String,
    },

    /// The parse was abandoned at a yield point
    #[error("Parse cancelled after {lines_read} lines")]
    Cancelled {
        /// Number of source lines consumed before cancellation.
        lines_read: usize,
    },
}

/// Network error type
///
/// Represents failures talking to the plotter's HTTP endpoints.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// The device answered with a non-success status
    #[error("HTTP {status} from {endpoint}")]
    Status {
        /// The endpoint path that was requested.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request did not complete in time
    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout {
        /// The endpoint path that was requested.
        endpoint: String,
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Transport-level failure (DNS, connection refused, reset)
    #[error("Transport error on {endpoint}: {reason}")]
    Transport {
        /// The endpoint path that was requested.
        endpoint: String,
        /// The reason reported by the HTTP client.
        reason: String,
    },

    /// The response body could not be decoded
    #[error("Invalid response body from {endpoint}: {reason}")]
    Decode {
        /// The endpoint path that was requested.
        endpoint: String,
        /// The reason the body could not be decoded.
        reason: String,
    },

    /// The device base URL is not usable
    #[error("Invalid device URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// The reason the URL was rejected.
        reason: String,
    },
}

/// Telemetry error type
///
/// Malformed telemetry is normally tolerated by substituting defaults; this
/// type only surfaces when a payload is unusable as a whole.
#[derive(Error, Debug, Clone)]
pub enum TelemetryError {
    /// Payload is not a JSON object
    #[error("Telemetry payload is not an object: {reason}")]
    NotAnObject {
        /// Why the payload was rejected.
        reason: String,
    },
}

/// Main error type for MuralKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Command stream parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Device network error
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Telemetry error
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(NetworkError::Timeout { .. }))
    }

    /// Check if this is a network error
    pub fn is_network_error(&self) -> bool {
        matches!(self, Error::Network(_))
    }

    /// Check if this is a parse error
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    /// Check if this error came from a cancelled operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Parse(ParseError::Cancelled { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::TooShort { lines: 1 };
        assert_eq!(
            err.to_string(),
            "Command stream too short: expected at least 2 lines, found 1"
        );

        let err = ParseError::MissingHeightHeader {
            found: "p1".to_string(),
        };
        assert!(err.to_string().contains("'h<height>'"));
        assert!(err.to_string().contains("p1"));
    }

    #[test]
    fn test_error_classification() {
        let err: Error = NetworkError::Timeout {
            endpoint: "/status".to_string(),
            timeout_ms: 6000,
        }
        .into();
        assert!(err.is_timeout());
        assert!(err.is_network_error());
        assert!(!err.is_parse_error());

        let err: Error = ParseError::Cancelled { lines_read: 300 }.into();
        assert!(err.is_parse_error());
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_telemetry_error_is_payload_only() {
        let err = TelemetryError::NotAnObject {
            reason: "expected object, got array".to_string(),
        };
        match &err {
            TelemetryError::NotAnObject { reason } => assert!(reason.contains("array")),
        }
        let err: Error = err.into();
        assert!(!err.is_network_error());
        assert!(err.to_string().starts_with("Telemetry payload is not an object"));
    }

    #[test]
    fn test_network_status_display() {
        let err = NetworkError::Status {
            endpoint: "/downloadCommands".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 from /downloadCommands");
    }
}
