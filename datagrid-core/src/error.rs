//! Error types for data grid operations.

use std::io;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for data grid operations.
#[derive(Debug, Error)]
pub enum GridError {
    /// Invalid argument supplied by the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A colocation key column is missing from the record.
    #[error("key column '{0}' is missing from the record")]
    MissingKeyColumn(String),

    /// A colocation key column holds a null value.
    #[error("key column '{0}' is null")]
    NullKeyColumn(String),

    /// The server does not know the requested table.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// Fetching a schema from the server failed.
    #[error("schema fetch failed: {0}")]
    SchemaFetch(String),

    /// The server does not know the requested schema version.
    #[error("unknown schema version {version} for table {table_id}")]
    UnknownSchemaVersion {
        /// Table identifier.
        table_id: i32,
        /// The version that was requested.
        version: i32,
    },

    /// Wire format violations: type mismatch, truncated or corrupt buffer.
    #[error("format error: {0}")]
    Format(String),

    /// Connection-related errors (network failures, disconnections).
    #[error("connection error: {0}")]
    Connection(String),

    /// Operation timeout errors.
    #[error("timeout error: {0}")]
    Timeout(String),

    /// An error reported by the server in a response frame.
    #[error("server error [group {group}, code {code}, trace {trace_id}]: {message}")]
    Server {
        /// Unique trace identifier for correlating with server logs.
        trace_id: Uuid,
        /// Numeric error group.
        group: i16,
        /// Numeric error code within the group.
        code: i16,
        /// Human-readable message.
        message: String,
    },

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl GridError {
    /// Returns true if this error is a caller bug rather than a fault of the
    /// cluster or the network. Usage errors are never retried.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            GridError::InvalidArgument(_)
                | GridError::MissingKeyColumn(_)
                | GridError::NullKeyColumn(_)
        )
    }

    /// Returns true if the failed operation may be retried against another
    /// node. The core only classifies; the transport decides whether to act,
    /// additionally gated on the operation's idempotency.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            GridError::Connection(_) | GridError::Timeout(_) | GridError::Io(_)
        )
    }
}

/// A specialized `Result` type for data grid operations.
pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_column_display() {
        let err = GridError::MissingKeyColumn("customer_id".to_string());
        assert_eq!(
            err.to_string(),
            "key column 'customer_id' is missing from the record"
        );
    }

    #[test]
    fn test_table_not_found_display() {
        let err = GridError::TableNotFound("orders".to_string());
        assert_eq!(err.to_string(), "table not found: orders");
    }

    #[test]
    fn test_server_error_display() {
        let trace_id = Uuid::nil();
        let err = GridError::Server {
            trace_id,
            group: 2,
            code: 7,
            message: "partition unavailable".to_string(),
        };
        assert!(err.to_string().contains("group 2"));
        assert!(err.to_string().contains("code 7"));
        assert!(err.to_string().contains("partition unavailable"));
    }

    #[test]
    fn test_usage_classification() {
        assert!(GridError::MissingKeyColumn("id".into()).is_usage());
        assert!(GridError::NullKeyColumn("id".into()).is_usage());
        assert!(GridError::InvalidArgument("empty".into()).is_usage());
        assert!(!GridError::Connection("reset".into()).is_usage());
        assert!(!GridError::Format("bad tag".into()).is_usage());
    }

    #[test]
    fn test_retriable_classification() {
        assert!(GridError::Connection("reset".into()).is_retriable());
        assert!(GridError::Timeout("30s".into()).is_retriable());
        assert!(!GridError::Format("bad tag".into()).is_retriable());
        assert!(!GridError::TableNotFound("t".into()).is_retriable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err: GridError = io_err.into();
        assert!(matches!(err, GridError::Io(_)));
        assert!(err.is_retriable());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GridError>();
    }
}
