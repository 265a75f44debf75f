//! Custom error types for geodex

use thiserror::Error;

/// Main error type for geodex operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Batch partially committed: {committed} items written before failure: {source}")]
    PartialBatch { committed: u64, source: sqlx::Error },

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for geodex
pub type Result<T> = std::result::Result<T, Error>;
