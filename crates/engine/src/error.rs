//! Error types for the BOM engine

use thiserror::Error;

/// Result type alias using the engine Error
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
///
/// Absent columns, rows and catalog matches are not errors: the algorithms
/// report them as `None` and a log line. These variants cover the cases a
/// caller has to see.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Table has no rows: {table}")]
    EmptyTable { table: String },

    #[error("Data row {index} appears before any group header")]
    OrphanRow { index: usize },

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timeout after {millis}ms waiting for: {what}")]
    Timeout { what: String, millis: u64 },

    #[error("Dialog not open: {0}")]
    DialogNotOpen(String),

    #[error("DOM error: {0}")]
    Dom(String),
}

impl Error {
    /// Whether this error is a wait that ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub(crate) fn not_found(selector: impl Into<String>) -> Self {
        Error::ElementNotFound {
            selector: selector.into(),
        }
    }
}
