//! Error types for geoedf-connectors
//!
//! Every plugin surfaces one error type. The only distinction callers need is
//! whether the plugin was misconfigured (nothing was attempted) or whether
//! something failed while the plugin was doing its work. Helper modules return
//! the transparent library variants; plugins wrap them into [`Error::Operation`]
//! with a message naming the plugin and the step that failed.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for geoedf-connectors operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for geoedf-connectors
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input detected before any work started
    #[error("configuration error in {plugin}: {message}")]
    Config {
        /// Plugin type name (e.g., "GeoRangeFilter")
        plugin: String,
        /// Human-readable description of the problem
        message: String,
    },

    /// Something failed while the plugin was doing its work
    #[error("{plugin} failed: {message}")]
    Operation {
        /// Plugin type name (e.g., "WQPInput")
        plugin: String,
        /// Human-readable description of the failed step
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Remote service answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shapefile could not be read
    #[error("shapefile error for {path}: {reason}")]
    Shapefile {
        /// Path of the shapefile
        path: PathBuf,
        /// Underlying reader error
        reason: String,
    },

    /// Coordinate reference system could not be resolved or applied
    #[error("projection error: {0}")]
    Projection(String),

    /// XML document could not be parsed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CSV could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Archive could not be extracted
    #[error("archive error for {archive}: {reason}")]
    Archive {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// A remote job did not finish within the poll budget
    #[error("{what} did not complete after {attempts} status checks")]
    PollExhausted {
        /// What was being waited on
        what: String,
        /// Number of status checks performed
        attempts: u32,
    },

    /// Malformed payload from a remote service
    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    /// URL cannot be resolved to one or more files
    #[error("{reason}: {url}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

impl Error {
    /// Build a configuration error for `plugin`
    pub fn config(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Build an operation error for `plugin`
    pub fn operation(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Operation {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// True if the error was raised before any work started
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }
}

/// Map any helper failure into an operation error for a plugin.
///
/// Configuration errors pass through untouched. Anything else becomes an
/// [`Error::Operation`] whose message is `"{message}: {cause}"`.
pub(crate) trait OperationContext<T> {
    /// Replace the error with [`Error::Operation`] carrying `message`
    fn op_context(self, plugin: &str, message: impl Into<String>) -> Result<T>;
}

impl<T> OperationContext<T> for Result<T> {
    fn op_context(self, plugin: &str, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| match e {
            Error::Config { .. } | Error::Operation { .. } => e,
            other => {
                let message = message.into();
                tracing::warn!(plugin, error = %other, "{}", message);
                Error::operation(plugin, format!("{}: {}", message, other))
            }
        })
    }
}
