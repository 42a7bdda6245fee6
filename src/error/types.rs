//! Error types
//!
//! Defines the error taxonomy shared by the storage layer and the HTTP surface.

use std::io;

use thiserror::Error;

/// Storage module errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Wrong category, extension or MIME type, or the payload exceeded the size ceiling
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// The operation targets a name that does not exist in the category directory
    #[error("File not found: {0}")]
    NotFound(String),

    /// Filesystem error during read, write, delete or enumerate
    #[error("{context}: {source}")]
    StorageFailure {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub fn invalid_file(message: impl Into<String>) -> Self {
        StorageError::InvalidFile(message.into())
    }

    pub fn failure(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::StorageFailure {
            context: context.into(),
            source,
        }
    }

    /// Map an io error on a named file: `NotFound` becomes a lookup miss, anything else a failure.
    pub fn from_lookup(name: &str, context: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::failure(context, source)
        }
    }

    /// Message safe to show to clients, without io internals
    pub fn user_message(&self) -> String {
        match self {
            StorageError::InvalidFile(message) => message.clone(),
            StorageError::NotFound(_) => "File not found".to_string(),
            StorageError::StorageFailure { context, .. } => context.clone(),
        }
    }
}

/// Errors that stop the server from starting or keep it from serving
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),
}
