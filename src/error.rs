//! Error types for the culgate library.

use thiserror::Error;

/// Exit code used when a startup prerequisite is missing.
pub const CONFIGURATION_MISSING_EXIT_CODE: i32 = 11;

/// The main error type for gateway operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A store call failed.
    #[error("store operation on {id} failed: {message}")]
    Store { id: String, message: String },

    /// The transport could not be opened.
    #[error("cannot open transport: {message}")]
    TransportOpen { message: String },

    /// Operation timed out.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// A startup prerequisite (role table, port) is missing.
    #[error("configuration missing: {what}")]
    ConfigurationMissing { what: String },

    /// A state id that does not address a device state.
    #[error("invalid id: {id}")]
    InvalidId { id: String },

    /// A command or state write the gateway does not support.
    #[error("not supported: {what}")]
    Unsupported { what: String },
}

/// Line framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// No line terminator within the maximum line length.
    #[error("line too long: {size} bytes exceeds maximum {max}")]
    TooLong { size: usize, max: usize },
}

impl Error {
    /// Builds a store error for `id`.
    pub fn store(id: impl Into<String>, message: impl ToString) -> Self {
        Self::Store {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if this error should abort startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationMissing { .. } | Self::TransportOpen { .. } | Self::Serial(_)
        )
    }

    /// Process exit code for fatal startup errors.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigurationMissing { .. } => CONFIGURATION_MISSING_EXIT_CODE,
            _ => 1,
        }
    }
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
