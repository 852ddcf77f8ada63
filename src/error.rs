// src/error.rs

use thiserror::Error;

/// Core error types for srcwatch
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    Init(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Upstream payload download failed
    #[error("Download failed: {0}")]
    Download(String),

    /// Malformed manifest or payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Notification transport setup failed
    #[error("Notification error: {0}")]
    Notify(String),
}

/// Result type alias using srcwatch's Error type
pub type Result<T> = std::result::Result<T, Error>;
