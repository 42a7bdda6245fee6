//! Server core functionality
//!
//! Startup (directory preparation, binding) and the serve loop.

pub mod core;

pub use self::core::{Server, build_app};
