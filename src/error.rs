//! Error types for ingestion and snapshot access.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Notion answered with a non-success status.
    #[error("Notion API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Transport-level failure talking to Notion.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Snapshot file could not be read or written.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The database listed pages but none of their blocks could be fetched.
    #[error("Block fetch failed for all {failed} pages; previous snapshot kept")]
    NoPagesFetched { failed: usize },

    /// Input could not be resolved to a Notion page id.
    #[error("Invalid page reference: {0}")]
    InvalidPageRef(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
