//! Error types for the dispatch core.

use std::fmt;

use thiserror::Error;

/// What kind of record a failed lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Edge,
    Driver,
    Ride,
    Request,
    GraphFile,
    ConfigFile,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
            EntityKind::Driver => "driver",
            EntityKind::Ride => "ride",
            EntityKind::Request => "ride request",
            EntityKind::GraphFile => "graph file",
            EntityKind::ConfigFile => "config file",
        };
        f.write_str(name)
    }
}

/// Dispatch error types.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Unknown node, driver, ride or request id, or a missing file.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Unknown enum value, malformed coordinate or out-of-range parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The target exists but is in the wrong state for the operation.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// No path exists between two known nodes.
    #[error("no path from node {from} to node {to}")]
    Unreachable { from: String, to: String },

    /// A graph file parsed as JSON but its contents are inconsistent.
    #[error("malformed graph file: {0}")]
    MalformedGraph(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn not_found(kind: EntityKind, id: impl fmt::Display) -> Self {
        DispatchError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DispatchError::InvalidArgument(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        DispatchError::PreconditionFailed(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::NotFound { .. })
    }
}

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_the_kind() {
        let err = DispatchError::not_found(EntityKind::Ride, 42);
        assert_eq!(err.to_string(), "ride not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DispatchError = io_err.into();
        assert!(matches!(err, DispatchError::Io(_)));
    }

    #[test]
    fn unreachable_is_not_a_lookup_failure() {
        let err = DispatchError::Unreachable {
            from: "A".into(),
            to: "B".into(),
        };
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "no path from node A to node B");
    }
}
