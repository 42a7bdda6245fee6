//! File system storage management
//!
//! Category policies, upload validation, naming, and the gatekeeper that
//! persists and serves stored assets.

pub mod category;
pub mod filesystem;
pub mod naming;
pub mod operations;
pub mod results;
pub mod validation;

pub use category::{Category, CategoryPolicy};
pub use operations::Gatekeeper;
pub use results::{IncomingFile, OpenedAsset, StoredAsset};
