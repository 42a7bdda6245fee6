//! Storage result types
//!
//! Defines the records passed into and returned by gatekeeper operations.

use std::path::PathBuf;

use crate::storage::category::Category;

/// A file persisted in a category directory under its generated name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub category: Category,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Client-declared metadata of an incoming multipart file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
}

impl IncomingFile {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type,
        }
    }
}

/// An asset opened for reading
#[derive(Debug)]
pub struct OpenedAsset {
    pub name: String,
    pub file: tokio::fs::File,
    pub size: u64,
}
