//! Benchmark error types.

use thiserror::Error;

use crate::backends::BackendKind;

/// Benchmark errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV sink error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Chart rendering error.
    #[error("chart error: {0}")]
    Chart(String),

    /// Could not reach or authenticate against a backend.
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend lacks a feature the query needs (module, index, command).
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A query or command failed at execution time.
    #[error("query error: {0}")]
    Query(String),

    /// A stored value could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A backend was recorded twice in one result table.
    #[error("duplicate result for backend {0}")]
    DuplicateBackend(BackendKind),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => Error::Connection(err.to_string()),
            other => Error::Query(other.to_string()),
        }
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        match *err.kind {
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Authentication { .. }
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Io(_)
            | ErrorKind::InvalidArgument { .. } => Error::Connection(err.to_string()),
            _ => Error::Query(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_io_error() || err.is_timeout() {
            return Error::Connection(err.to_string());
        }

        match err.kind() {
            redis::ErrorKind::AuthenticationFailed => Error::Connection(err.to_string()),
            // Unknown commands and unknown indexes come back as response errors.
            redis::ErrorKind::ResponseError | redis::ErrorKind::ExtensionError => {
                Error::Unsupported(err.to_string())
            }
            _ => Error::Query(err.to_string()),
        }
    }
}

/// Result alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;
