//! JSON bodies returned by the HTTP surface

use serde::{Deserialize, Serialize};

/// Body of a successful POST upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub url: String,
}

/// Body of a successful PUT replacement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceResponse {
    pub message: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
