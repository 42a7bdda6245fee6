//! Storage categories
//!
//! Each category owns a directory, a size ceiling and the extension/MIME
//! allow-lists its uploads are checked against.

use std::fmt;
use std::path::PathBuf;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

pub const TABULAR_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];

pub const TABULAR_MIME_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
    "text/csv",
    "application/csv",
];

/// The two fixed file classes the server accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    TabularData,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Image, Category::TabularData];

    /// Path segment under which the category is routed, also the multipart field name
    pub fn route_segment(self) -> &'static str {
        match self {
            Category::Image => "imagen",
            Category::TabularData => "excel",
        }
    }

    pub fn field_name(self) -> &'static str {
        self.route_segment()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Image => write!(f, "image"),
            Category::TabularData => write!(f, "tabular data"),
        }
    }
}

/// Storage and validation rules for one category.
///
/// An upload is accepted when its lowercased extension is in
/// `allowed_extensions` OR its declared MIME type is in `allowed_mime_types`.
/// Images carry an empty MIME list, so for them the extension alone decides.
#[derive(Debug, Clone)]
pub struct CategoryPolicy {
    pub category: Category,
    pub directory: PathBuf,
    pub max_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl CategoryPolicy {
    pub fn image(directory: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            category: Category::Image,
            directory: directory.into(),
            max_bytes,
            allowed_extensions: to_owned_list(IMAGE_EXTENSIONS),
            allowed_mime_types: Vec::new(),
        }
    }

    pub fn tabular(directory: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            category: Category::TabularData,
            directory: directory.into(),
            max_bytes,
            allowed_extensions: to_owned_list(TABULAR_EXTENSIONS),
            allowed_mime_types: to_owned_list(TABULAR_MIME_TYPES),
        }
    }

    /// Whether a lowercased extension (without the dot) is in the allow-list
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|allowed| allowed == extension)
    }

    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|allowed| allowed == mime_type)
    }

    /// Human-readable list of accepted extensions, e.g. `.xlsx, .xls, .csv`
    pub fn describe_extensions(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
