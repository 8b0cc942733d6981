//! Error types for cellscope.

use std::io;
use thiserror::Error;

/// Result type alias for cellscope operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache, codec and settings operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Table was never registered through `list_tables`.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Family was never registered through `list_families`.
    #[error("Unknown column family '{family}' in table '{table}'")]
    UnknownFamily { table: String, family: String },

    /// The remote store could not be reached or rejected the request.
    #[error("Remote store unavailable during {operation} [{target}]: {cause}")]
    RemoteUnavailable {
        operation: String,
        target: String,
        cause: String,
    },

    /// Text that cannot be turned into bytes under the given encoding.
    #[error("Invalid {encoding} input: {reason}")]
    InvalidEncodingInput { encoding: String, reason: String },

    /// Encoding name is not registered.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Settings could not be read or stored.
    #[error("Settings error: {0}")]
    Settings(String),

    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create an unknown family error.
    pub fn unknown_family<T: Into<String>, F: Into<String>>(table: T, family: F) -> Self {
        Error::UnknownFamily {
            table: table.into(),
            family: family.into(),
        }
    }

    /// Create a remote error for `operation` against `target`.
    pub fn remote<O, T, C>(operation: O, target: T, cause: C) -> Self
    where
        O: Into<String>,
        T: Into<String>,
        C: ToString,
    {
        Error::RemoteUnavailable {
            operation: operation.into(),
            target: target.into(),
            cause: cause.to_string(),
        }
    }

    /// Create an invalid encoding input error.
    pub fn invalid_input<E: Into<String>, R: Into<String>>(encoding: E, reason: R) -> Self {
        Error::InvalidEncodingInput {
            encoding: encoding.into(),
            reason: reason.into(),
        }
    }

    /// Create a settings error.
    pub fn settings<S: Into<String>>(msg: S) -> Self {
        Error::Settings(msg.into())
    }

    /// Check if the caller may reasonably retry the operation.
    ///
    /// The cache itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RemoteUnavailable { .. })
    }

    /// Check if this error is caused by how the caller sequenced or
    /// parameterised the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownTable(_)
                | Error::UnknownFamily { .. }
                | Error::InvalidEncodingInput { .. }
                | Error::UnsupportedEncoding(_)
        )
    }
}
