//! Upload validation
//!
//! Decides whether a declared filename/MIME pair is acceptable for a category,
//! and guards name lookups against path traversal.

use log::{debug, warn};
use std::path::Path;

use crate::error::StorageError;
use crate::storage::category::CategoryPolicy;

/// Extension of a client-supplied filename, without the dot and with its case preserved
pub fn extension_of(filename: &str) -> Option<&str> {
    Path::new(filename).extension().and_then(|ext| ext.to_str())
}

/// Lowercased extension, the form allow-lists are matched against
pub fn normalized_extension(filename: &str) -> Option<String> {
    extension_of(filename).map(|ext| ext.to_ascii_lowercase())
}

/// Lowercased `type/subtype` of a declared Content-Type, parameters dropped
pub fn mime_essence(declared: &str) -> String {
    declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Check a declared filename and MIME type against the category policy.
///
/// Extension and MIME type are OR'd: either signal matching is enough. Nothing
/// touches the filesystem here.
pub fn validate(
    policy: &CategoryPolicy,
    declared_filename: &str,
    declared_mime_type: Option<&str>,
) -> Result<(), StorageError> {
    let extension = normalized_extension(declared_filename);

    debug!(
        "Validating {} upload: filename={:?} extension={:?} mime={:?}",
        policy.category, declared_filename, extension, declared_mime_type
    );

    let extension_ok = extension
        .as_deref()
        .is_some_and(|ext| policy.allows_extension(ext));
    let mime_ok = declared_mime_type
        .map(mime_essence)
        .is_some_and(|mime| policy.allows_mime_type(&mime));

    if extension_ok || mime_ok {
        return Ok(());
    }

    warn!(
        "Rejected {} upload {:?} (mime {:?})",
        policy.category, declared_filename, declared_mime_type
    );

    Err(StorageError::invalid_file(format!(
        "Only {} files are allowed ({})",
        policy.category,
        policy.describe_extensions()
    )))
}

/// Whether a stored name belongs in the category listing
pub fn is_listable(policy: &CategoryPolicy, name: &str) -> bool {
    normalized_extension(name).is_some_and(|ext| policy.allows_extension(&ext))
}

/// Sanitize a filename used to look up a stored asset.
///
/// Returns `None` for names that could escape the category directory and for
/// hidden names, which include the staging files of in-flight uploads.
pub fn sanitize_filename(filename: &str) -> Option<&str> {
    let unsafe_name = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\', '\0']);

    if unsafe_name { None } else { Some(filename) }
}
