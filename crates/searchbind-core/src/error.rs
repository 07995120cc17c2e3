//! Error types for searchbind.
//!
//! The taxonomy distinguishes four failure classes with different handling
//! rules:
//!
//! - [`Error::Configuration`]: raised synchronously when a query or backend
//!   is set up wrong (unknown field path, unsupported lookup, bad settings).
//!   Never retried, never swallowed.
//! - [`Error::Indexing`]: a single record failed to be added or deleted.
//!   Swallowed and logged when the backend's `catch_indexing_errors` flag is
//!   set, otherwise propagated.
//! - [`Error::Transport`]: connection failure, timeout, or malformed backend
//!   response. Always propagated.
//! - [`Error::Rebuild`]: a full reindex aborted; carries the record type and
//!   batch offset needed to resume.

use thiserror::Error;

/// Result type alias for searchbind operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in searchbind.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A query or backend was configured incorrectly. Raised at compile or
    /// setup time, before any backend round-trip.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable description of the problem.
        message: String,
        /// The offending field path, when the error concerns one.
        field: Option<String>,
    },

    /// A single record could not be added to or deleted from an index.
    #[error("indexing error for record '{record}': {message}")]
    Indexing {
        /// Identity key of the record that failed.
        record: String,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The backend transport failed: connection error, timeout, or a
    /// response that could not be interpreted.
    #[error("transport error: {0}")]
    Transport(String),

    /// A full index rebuild aborted mid-populate.
    #[error("rebuild of '{record_type}' failed at batch offset {batch_offset}: {source}")]
    Rebuild {
        /// The record type whose rebuild failed.
        record_type: String,
        /// Offset of the first record in the failing batch.
        batch_offset: usize,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error with no associated field.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error pointing at a specific field path.
    pub fn configuration_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an indexing error for a single record.
    pub fn indexing(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Indexing {
            record: record.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Wrap a failure that aborted a rebuild, recording where it happened.
    pub fn rebuild(record_type: impl Into<String>, batch_offset: usize, source: Error) -> Self {
        Self::Rebuild {
            record_type: record_type.into(),
            batch_offset,
            source: Box::new(source),
        }
    }

    /// Returns `true` for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` for single-record indexing errors.
    pub fn is_indexing(&self) -> bool {
        matches!(self, Self::Indexing { .. })
    }

    /// Returns `true` for transport errors.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// The field path this error points at, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Configuration { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

// A response body that fails to parse is a malformed backend response, not
// a caller mistake.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("malformed backend response: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
