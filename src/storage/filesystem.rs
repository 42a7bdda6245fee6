//! File system operations
//!
//! Small async helpers around `tokio::fs` used by the gatekeeper.

use log::warn;
use std::io::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Create a directory and any missing parents
pub async fn create_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await
}

/// Hidden sibling a file is written to before it is published
pub fn temp_path_for(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!(".{name}.tmp"))
}

/// Link `temp` into place at `target`, failing with `AlreadyExists` instead of overwriting.
///
/// The temporary name is removed once the link exists, and the parent
/// directory is synced so the new entry survives a crash. If that sync fails
/// the target is removed again.
pub async fn publish_no_clobber(temp: &Path, target: &Path) -> Result<()> {
    fs::hard_link(temp, target).await?;
    remove_quietly(temp).await;

    let parent = target.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(directory) = parent {
        if let Err(e) = sync_directory(directory).await {
            remove_quietly(target).await;
            return Err(e);
        }
    }
    Ok(())
}

/// Flush a directory's entries to disk
pub async fn sync_directory(path: &Path) -> Result<()> {
    fs::File::open(path).await?.sync_all().await
}

/// Remove a file, logging anything other than "already gone"
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to clean up {}: {}", path.display(), e);
        }
    }
}
