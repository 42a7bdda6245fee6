//! Storage operations
//!
//! The gatekeeper validates, names and persists uploads, and serves the
//! list, read, replace and delete operations over the category directories.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use log::{error, info, warn};
use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::config::ServerConfig;
use crate::error::StorageError;
use crate::storage::category::{Category, CategoryPolicy};
use crate::storage::filesystem::{
    create_directory, publish_no_clobber, remove_quietly, temp_path_for,
};
use crate::storage::naming::{NameClock, generated_name};
use crate::storage::results::{IncomingFile, OpenedAsset, StoredAsset};
use crate::storage::validation::{is_listable, sanitize_filename, validate};

/// Attempts at finding a free generated name before giving up
const MAX_NAME_ATTEMPTS: usize = 3;

/// Guards every write into the category directories
#[derive(Debug)]
pub struct Gatekeeper {
    image: CategoryPolicy,
    tabular: CategoryPolicy,
    clock: NameClock,
}

impl Gatekeeper {
    pub fn new(image: CategoryPolicy, tabular: CategoryPolicy) -> Self {
        Self {
            image,
            tabular,
            clock: NameClock::new(),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.policy(Category::Image),
            config.policy(Category::TabularData),
        )
    }

    pub fn policy(&self, category: Category) -> &CategoryPolicy {
        match category {
            Category::Image => &self.image,
            Category::TabularData => &self.tabular,
        }
    }

    /// Create the category directories if they are missing
    pub async fn prepare_directories(&self) -> Result<(), StorageError> {
        for category in Category::ALL {
            let directory = &self.policy(category).directory;
            create_directory(directory).await.map_err(|e| {
                error!("Failed to create {} directory {}: {}", category, directory.display(), e);
                StorageError::failure("Failed to create storage directory", e)
            })?;
            info!("Storing {} files in {}", category, directory.display());
        }
        Ok(())
    }

    /// Check a declared filename and MIME type against the category policy
    pub fn validate(
        &self,
        category: Category,
        declared_filename: &str,
        declared_mime_type: Option<&str>,
    ) -> Result<(), StorageError> {
        validate(self.policy(category), declared_filename, declared_mime_type)
    }

    /// Name for a new upload: `<fieldName>-<millis>.<origExt>`
    pub fn generate_name(&self, field_name: &str, original_name: &str) -> String {
        generated_name(field_name, original_name, self.clock.next_millis())
    }

    /// Write a byte stream to `<categoryDirectory>/<generatedName>`.
    ///
    /// Enforces the category's size ceiling while streaming and refuses to
    /// overwrite an existing file. On any failure no file is left behind.
    pub async fn store<S, E>(
        &self,
        category: Category,
        generated_name: &str,
        stream: S,
    ) -> Result<StoredAsset, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let policy = self.policy(category);
        let name = sanitize_filename(generated_name)
            .ok_or_else(|| StorageError::invalid_file("Invalid file name"))?;

        let fixed = name.to_string();
        self.persist(policy, name.to_string(), stream, 1, || fixed.clone())
            .await
    }

    /// Validate, name and store a new upload
    pub async fn upload<S, E>(
        &self,
        category: Category,
        incoming: &IncomingFile,
        stream: S,
    ) -> Result<StoredAsset, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        self.validate(
            category,
            &incoming.file_name,
            incoming.content_type.as_deref(),
        )?;
        self.store_new(self.policy(category), incoming, stream).await
    }

    /// Replace an existing asset with a new upload stored under a fresh name.
    ///
    /// The new file is durably written before the old one is deleted. If the
    /// old name does not exist nothing is written.
    pub async fn replace<S, E>(
        &self,
        category: Category,
        existing_name: &str,
        incoming: &IncomingFile,
        stream: S,
    ) -> Result<StoredAsset, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let policy = self.policy(category);
        self.validate(
            category,
            &incoming.file_name,
            incoming.content_type.as_deref(),
        )?;

        let old_path = resolve(policy, existing_name)?;
        let metadata = fs::metadata(&old_path)
            .await
            .map_err(|e| StorageError::from_lookup(existing_name, "Failed to read file", e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(existing_name.to_string()));
        }

        let asset = self.store_new(policy, incoming, stream).await?;

        match fs::remove_file(&old_path).await {
            Ok(()) => {
                info!(
                    "Replaced {} file {} with {}",
                    category, existing_name, asset.name
                );
                Ok(asset)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "{} disappeared before it could be replaced, discarding {}",
                    existing_name, asset.name
                );
                remove_quietly(&asset.path).await;
                Err(StorageError::NotFound(existing_name.to_string()))
            }
            Err(e) => {
                error!("Failed to delete previous file {}: {}", old_path.display(), e);
                Err(StorageError::failure("Failed to delete previous file", e))
            }
        }
    }

    /// Delete a stored asset
    pub async fn delete(&self, category: Category, name: &str) -> Result<(), StorageError> {
        let path = resolve(self.policy(category), name)?;

        if let Err(e) = fs::remove_file(&path).await {
            // Directories inside the category directory are not assets
            let not_a_file = fs::symlink_metadata(&path)
                .await
                .is_ok_and(|metadata| !metadata.is_file());
            if not_a_file {
                return Err(StorageError::NotFound(name.to_string()));
            }
            return Err(StorageError::from_lookup(name, "Failed to delete file", e));
        }

        info!("Deleted {} file {}", category, path.display());
        Ok(())
    }

    /// Names in the category directory whose extension the category accepts.
    ///
    /// Order is whatever the filesystem enumerates; recomputed on every call.
    pub async fn list(&self, category: Category) -> Result<Vec<String>, StorageError> {
        let policy = self.policy(category);
        let read_error = |e: std::io::Error| {
            error!(
                "Failed to list directory {}: {}",
                policy.directory.display(),
                e
            );
            StorageError::failure("Failed to read directory", e)
        };

        let mut entries = fs::read_dir(&policy.directory).await.map_err(read_error)?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if is_listable(policy, &name) {
                names.push(name);
            }
        }

        Ok(names)
    }

    /// Open a stored asset for reading
    pub async fn open(&self, category: Category, name: &str) -> Result<OpenedAsset, StorageError> {
        let path = resolve(self.policy(category), name)?;

        let file = File::open(&path)
            .await
            .map_err(|e| StorageError::from_lookup(name, "Failed to open file", e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| StorageError::failure("Failed to read file", e))?;

        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        Ok(OpenedAsset {
            name: name.to_string(),
            file,
            size: metadata.len(),
        })
    }

    async fn store_new<S, E>(
        &self,
        policy: &CategoryPolicy,
        incoming: &IncomingFile,
        stream: S,
    ) -> Result<StoredAsset, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let first = self.generate_name(&incoming.field_name, &incoming.file_name);
        self.persist(policy, first, stream, MAX_NAME_ATTEMPTS, || {
            self.generate_name(&incoming.field_name, &incoming.file_name)
        })
        .await
    }

    /// Stream into a temp file, then publish it under `name`, asking
    /// `next_name` for another name while the target already exists.
    async fn persist<S, E, F>(
        &self,
        policy: &CategoryPolicy,
        mut name: String,
        stream: S,
        max_attempts: usize,
        mut next_name: F,
    ) -> Result<StoredAsset, StorageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
        F: FnMut() -> String,
    {
        let temp_path = temp_path_for(&policy.directory, &name);
        let size = write_temp_file(policy, &temp_path, stream).await?;

        let mut attempt = 1;
        loop {
            let target = policy.directory.join(&name);
            match publish_no_clobber(&temp_path, &target).await {
                Ok(()) => {
                    info!(
                        "Stored {} file {} ({} bytes)",
                        policy.category,
                        target.display(),
                        size
                    );
                    return Ok(StoredAsset {
                        category: policy.category,
                        name,
                        path: target,
                        size,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < max_attempts => {
                    warn!("{} already exists, picking another name", target.display());
                    attempt += 1;
                    name = next_name();
                }
                Err(e) => {
                    error!(
                        "Failed to move {} to {}: {}",
                        temp_path.display(),
                        target.display(),
                        e
                    );
                    remove_quietly(&temp_path).await;
                    return Err(StorageError::failure("Failed to save file", e));
                }
            }
        }
    }
}

/// Path of `name` inside the category directory; unsafe names never exist.
fn resolve(policy: &CategoryPolicy, name: &str) -> Result<PathBuf, StorageError> {
    sanitize_filename(name)
        .map(|safe| policy.directory.join(safe))
        .ok_or_else(|| StorageError::NotFound(name.to_string()))
}

/// Write the stream to `temp_path`, removing the file again on any failure
async fn write_temp_file<S, E>(
    policy: &CategoryPolicy,
    temp_path: &Path,
    stream: S,
) -> Result<u64, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await
        .map_err(|e| {
            error!("Failed to create temporary file {}: {}", temp_path.display(), e);
            StorageError::failure("Failed to create file", e)
        })?;

    let result = copy_stream(policy, &mut file, stream).await;
    drop(file);

    if result.is_err() {
        remove_quietly(temp_path).await;
    }
    result
}

async fn copy_stream<S, E>(
    policy: &CategoryPolicy,
    file: &mut File,
    stream: S,
) -> Result<u64, StorageError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    pin_mut!(stream);
    let mut total_bytes = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            warn!("Upload stream failed after {} bytes: {}", total_bytes, e);
            StorageError::invalid_file(format!("Failed to read uploaded file: {e}"))
        })?;

        // Check the ceiling before writing (fail fast)
        total_bytes += chunk.len() as u64;
        if total_bytes > policy.max_bytes {
            warn!(
                "File size limit exceeded: {} bytes > {} bytes",
                total_bytes, policy.max_bytes
            );
            return Err(StorageError::invalid_file(format!(
                "File too large (max {} MB)",
                policy.max_bytes / (1024 * 1024)
            )));
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| StorageError::failure("Failed to write file", e))?;
    }

    file.flush()
        .await
        .map_err(|e| StorageError::failure("Failed to write file", e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::failure("Failed to write file", e))?;

    Ok(total_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;
    use tempfile::TempDir;

    const SMALL_LIMIT: u64 = 1024;

    fn gatekeeper(root: &TempDir) -> Gatekeeper {
        Gatekeeper::new(
            CategoryPolicy::image(root.path().join("uploads"), SMALL_LIMIT),
            CategoryPolicy::tabular(root.path().join("archivos"), 2 * SMALL_LIMIT),
        )
    }

    async fn prepared(root: &TempDir) -> Gatekeeper {
        let gatekeeper = gatekeeper(root);
        gatekeeper.prepare_directories().await.unwrap();
        gatekeeper
    }

    fn body<I, B>(chunks: I) -> impl Stream<Item = Result<Bytes, io::Error>>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let chunks: Vec<_> = chunks
            .into_iter()
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk.as_ref())))
            .collect();
        stream::iter(chunks)
    }

    fn image(file_name: &str) -> IncomingFile {
        IncomingFile::new("imagen", file_name, Some("image/png".to_string()))
    }

    fn dir_entries(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(path)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn upload_writes_bytes_under_generated_name() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let asset = gatekeeper
            .upload(Category::Image, &image("cat.png"), body([b"abc", b"def"]))
            .await
            .unwrap();

        assert!(asset.name.starts_with("imagen-"));
        assert!(asset.name.ends_with(".png"));
        assert_eq!(asset.size, 6);
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"abcdef");
        assert_eq!(dir_entries(&root.path().join("uploads")), vec![asset.name]);
    }

    #[tokio::test]
    async fn rejected_upload_touches_nothing() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let err = gatekeeper
            .upload(Category::Image, &image("notes.txt"), body([b"abc"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InvalidFile(_)));
        assert!(dir_entries(&root.path().join("uploads")).is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_cleaned_up() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        static BIG: [u8; 700] = [7u8; 700];

        let err = gatekeeper
            .upload(Category::Image, &image("big.gif"), body([&BIG, &BIG]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InvalidFile(_)));
        assert!(dir_entries(&root.path().join("uploads")).is_empty());
    }

    #[tokio::test]
    async fn file_at_exact_ceiling_is_accepted() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        static EXACT: [u8; 1024] = [1u8; 1024];

        let asset = gatekeeper
            .upload(Category::Image, &image("edge.jpg"), body([&EXACT]))
            .await
            .unwrap();
        assert_eq!(asset.size, SMALL_LIMIT);
    }

    #[tokio::test]
    async fn broken_stream_leaves_no_partial_file() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
        ]);

        let err = gatekeeper
            .upload(Category::Image, &image("cut.png"), chunks)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InvalidFile(_)));
        assert!(dir_entries(&root.path().join("uploads")).is_empty());
    }

    #[tokio::test]
    async fn store_refuses_to_overwrite() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        gatekeeper
            .store(Category::Image, "imagen-1.png", body([b"first"]))
            .await
            .unwrap();
        let err = gatekeeper
            .store(Category::Image, "imagen-1.png", body([b"second"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::StorageFailure { .. }));
        let path = root.path().join("uploads").join("imagen-1.png");
        assert_eq!(std::fs::read(path).unwrap(), b"first");
        assert_eq!(
            dir_entries(&root.path().join("uploads")),
            vec!["imagen-1.png".to_string()]
        );
    }

    #[tokio::test]
    async fn consecutive_uploads_get_distinct_names() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let first = gatekeeper
            .upload(Category::Image, &image("a.png"), body([b"1"]))
            .await
            .unwrap();
        let second = gatekeeper
            .upload(Category::Image, &image("a.png"), body([b"2"]))
            .await
            .unwrap();

        assert_ne!(first.name, second.name);
    }

    #[tokio::test]
    async fn list_filters_foreign_files() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        let uploads = root.path().join("uploads");
        std::fs::write(uploads.join("dropped.txt"), b"x").unwrap();
        std::fs::write(uploads.join("manual.PNG"), b"x").unwrap();
        std::fs::write(uploads.join(".imagen-9.png.tmp"), b"x").unwrap();

        let mut names = gatekeeper.list(Category::Image).await.unwrap();
        names.sort();
        assert_eq!(names, vec!["manual.PNG".to_string()]);
    }

    #[tokio::test]
    async fn list_of_missing_directory_is_a_failure() {
        let root = TempDir::new().unwrap();
        let gatekeeper = gatekeeper(&root);

        let err = gatekeeper.list(Category::TabularData).await.unwrap_err();
        assert!(matches!(err, StorageError::StorageFailure { .. }));
    }

    #[tokio::test]
    async fn categories_are_disjoint() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let asset = gatekeeper
            .upload(Category::Image, &image("cat.png"), body([b"x"]))
            .await
            .unwrap();

        let err = gatekeeper
            .open(Category::TabularData, &asset.name)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_then_open_is_not_found() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let asset = gatekeeper
            .upload(Category::Image, &image("cat.png"), body([b"x"]))
            .await
            .unwrap();
        gatekeeper.delete(Category::Image, &asset.name).await.unwrap();

        assert!(matches!(
            gatekeeper.open(Category::Image, &asset.name).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            gatekeeper.delete(Category::Image, &asset.name).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_of_directory_is_not_found() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        let nested = root.path().join("uploads").join("sub.png");
        std::fs::create_dir(&nested).unwrap();

        let err = gatekeeper.delete(Category::Image, "sub.png").await.unwrap_err();

        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn staging_files_are_not_served() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        let staging = root.path().join("uploads").join(".imagen-1.png.tmp");
        std::fs::write(&staging, b"partial").unwrap();

        assert!(matches!(
            gatekeeper.open(Category::Image, ".imagen-1.png.tmp").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            gatekeeper.delete(Category::Image, ".imagen-1.png.tmp").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(staging.exists());
    }

    #[tokio::test]
    async fn traversal_names_are_not_found() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        std::fs::write(root.path().join("secret.png"), b"x").unwrap();

        assert!(matches!(
            gatekeeper.open(Category::Image, "../secret.png").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            gatekeeper.delete(Category::Image, "..").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn replace_writes_new_name_and_removes_old() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let old = gatekeeper
            .upload(Category::Image, &image("old.png"), body([b"old"]))
            .await
            .unwrap();
        let new = gatekeeper
            .replace(Category::Image, &old.name, &image("new.jpg"), body([b"new"]))
            .await
            .unwrap();

        assert_ne!(old.name, new.name);
        assert!(new.name.ends_with(".jpg"));
        assert!(!old.path.exists());
        assert_eq!(std::fs::read(&new.path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn replace_of_missing_name_creates_nothing() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let err = gatekeeper
            .replace(Category::Image, "imagen-0.png", &image("new.png"), body([b"x"]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::NotFound(_)));
        assert!(dir_entries(&root.path().join("uploads")).is_empty());
    }

    #[tokio::test]
    async fn replace_validates_before_lookup() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;

        let err = gatekeeper
            .replace(Category::Image, "missing.png", &image("doc.pdf"), body([b"x"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidFile(_)));
    }

    #[tokio::test]
    async fn failed_replacement_keeps_old_file() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        static BIG: [u8; 1500] = [0u8; 1500];

        let old = gatekeeper
            .upload(Category::Image, &image("old.png"), body([b"old"]))
            .await
            .unwrap();
        let err = gatekeeper
            .replace(Category::Image, &old.name, &image("huge.png"), body([&BIG]))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InvalidFile(_)));
        assert_eq!(std::fs::read(&old.path).unwrap(), b"old");
        assert_eq!(dir_entries(&root.path().join("uploads")), vec![old.name]);
    }

    #[tokio::test]
    async fn tabular_accepts_mime_only_match() {
        let root = TempDir::new().unwrap();
        let gatekeeper = prepared(&root).await;
        let incoming = IncomingFile::new("excel", "data.bin", Some("text/csv".to_string()));

        let asset = gatekeeper
            .upload(Category::TabularData, &incoming, body([b"a,b\n1,2\n"]))
            .await
            .unwrap();

        assert!(asset.name.starts_with("excel-"));
        assert!(asset.name.ends_with(".bin"));
        assert!(asset.path.starts_with(root.path().join("archivos")));
    }
}
