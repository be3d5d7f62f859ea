//! Error taxonomy for the directory, ingestion pipeline, and command bus.
//!
//! Store- and bus-level errors propagate unchanged to the caller. The only
//! errors the library aggregates instead of raising are per-entry playlist
//! parse failures, which are reported in [`crate::ingest::IngestReport`].

/// Errors produced by the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid connection parameters for the store or the bus.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An id, name, url, or the current-channel pointer could not be resolved.
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// Random selection was requested while the directory counter is zero.
    #[error("channel directory is empty")]
    EmptyDirectory,

    /// A record was rejected before any write happened.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Malformed input that cannot be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// The store or the bus could not be reached, or rejected the request.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        Error::NotFound {
            what,
            key: key.into(),
        }
    }

    /// Short machine-readable code, used by the HTTP surface.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::NotFound { .. } => "not_found",
            Error::EmptyDirectory => "empty_directory",
            Error::InvalidRecord(_) => "invalid_record",
            Error::Parse(_) => "parse",
            Error::Transport(_) => "transport",
            Error::Io { .. } => "io",
            Error::Cancelled => "cancelled",
            Error::DeadlineExceeded => "timeout",
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Transport(format!("store: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(format!("bus: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;
