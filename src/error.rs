//! Unified error handling for the route pipeline.
//!
//! Extraction and parse failures abort a route build. Routing failures are
//! per-segment and only degrade the routed path; the segment router swallows
//! them after logging. Malformed coordinates are never an error: the
//! normalizer drops them.

use thiserror::Error;

/// Why a device position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorKind {
    /// The user or platform refused location access
    PermissionDenied,
    /// No fix could be obtained
    Unavailable,
    /// The position source gave up waiting for a fix
    Timeout,
}

impl std::fmt::Display for PositionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PositionErrorKind::PermissionDenied => "permission denied",
            PositionErrorKind::Unavailable => "position unavailable",
            PositionErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Unified error type for route pipeline operations.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// KMZ archive unreadable or missing a KML entry
    #[error("KMZ extraction failed: {message}")]
    Extraction { message: String },

    /// KML document is not well-formed XML
    #[error("KML parse failed: {message}")]
    Parse { message: String },

    /// A single directions lookup failed
    #[error("{}", http_message("Directions lookup failed", .message, .status_code))]
    Routing {
        message: String,
        status_code: Option<u16>,
    },

    /// Geolocation unavailable or denied
    #[error("Position error ({kind}): {message}")]
    Position {
        kind: PositionErrorKind,
        message: String,
    },

    /// Retrieving the route file failed
    #[error("{}", http_message("Fetch failed", .message, .status_code))]
    Fetch {
        message: String,
        status_code: Option<u16>,
    },

    /// Invalid tracking state transition
    #[error("Tracking error: {message}")]
    Tracking { message: String },

    /// Trip history could not be stored or (de)serialized
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Configuration could not be parsed or is out of range
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn http_message(prefix: &str, message: &str, status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!("{} ({}): {}", prefix, code, message),
        None => format!("{}: {}", prefix, message),
    }
}

impl RouteError {
    pub(crate) fn extraction(message: impl Into<String>) -> Self {
        RouteError::Extraction {
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        RouteError::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn tracking(message: impl Into<String>) -> Self {
        RouteError::Tracking {
            message: message.into(),
        }
    }

    /// Build a storage error, e.g. from a trip sink implementation.
    pub fn storage(message: impl Into<String>) -> Self {
        RouteError::Storage {
            message: message.into(),
        }
    }

    /// Build a routing error, e.g. from a directions provider implementation.
    pub fn routing(message: impl Into<String>, status_code: Option<u16>) -> Self {
        RouteError::Routing {
            message: message.into(),
            status_code,
        }
    }

    /// Build a position error, e.g. from a position source implementation.
    pub fn position(kind: PositionErrorKind, message: impl Into<String>) -> Self {
        RouteError::Position {
            kind,
            message: message.into(),
        }
    }

    /// Build a fetch error, e.g. from a KMZ source implementation.
    pub fn fetch(message: impl Into<String>, status_code: Option<u16>) -> Self {
        RouteError::Fetch {
            message: message.into(),
            status_code,
        }
    }

    /// True when the error only degrades output instead of aborting the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RouteError::Routing { .. })
    }
}

impl From<zip::result::ZipError> for RouteError {
    fn from(e: zip::result::ZipError) -> Self {
        RouteError::extraction(e.to_string())
    }
}

impl From<quick_xml::Error> for RouteError {
    fn from(e: quick_xml::Error) -> Self {
        RouteError::parse(e.to_string())
    }
}

/// Result type alias for route pipeline operations.
pub type Result<T> = std::result::Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouteError::routing("HTTP 500", Some(500));
        assert_eq!(err.to_string(), "Directions lookup failed (500): HTTP 500");

        let err = RouteError::fetch("connection reset", None);
        assert_eq!(err.to_string(), "Fetch failed: connection reset");

        let err = RouteError::storage("disk full");
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = RouteError::position(PositionErrorKind::PermissionDenied, "user declined");
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_only_routing_is_recoverable() {
        assert!(RouteError::routing("x", None).is_recoverable());
        assert!(!RouteError::extraction("x").is_recoverable());
        assert!(!RouteError::parse("x").is_recoverable());
        assert!(!RouteError::tracking("x").is_recoverable());
    }
}
