//! src/services/object_store.rs
//!
//! Blob storage keyed by file name. `LocalObjectStore` keeps one directory
//! per bucket and shards payloads beneath
//! `base_path/{bucket}/{shard}/{shard}/{md5(bucket/key)}`.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Put/get/delete of whole blobs by key. Puts overwrite silently.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> ObjectStoreResult<()>;
    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes>;
    /// Removing a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> ObjectStoreResult<()>;
    async fn health_check(&self) -> ObjectStoreResult<()>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Filesystem-backed object store for a single bucket.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Directory holding every bucket.
    base_path: PathBuf,
    bucket: String,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
        }
    }

    /// Create the bucket directory. Safe to call repeatedly.
    pub async fn create_bucket(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(self.bucket_root()).await?;
        Ok(())
    }

    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    /// Keys are opaque to the store, so only empty or oversized keys are
    /// rejected. Any other string is legal.
    fn ensure_key_valid(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidKey);
        }
        Ok(())
    }

    /// Payload path for `key`: `{bucket}/{shard}/{shard}/{md5(bucket/key)}`.
    ///
    /// The key never reaches the filesystem as a path, so names like `.`,
    /// `dir/` or `v1..final.png` map to ordinary files inside the bucket.
    fn object_path(&self, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}/{}", self.bucket, key));
        let mut path = self.bucket_root();
        path.push(format!("{:02x}", digest[0]));
        path.push(format!("{:02x}", digest[1]));
        path.push(format!("{:x}", digest));
        path
    }

    async fn ensure_bucket(&self) -> ObjectStoreResult<PathBuf> {
        let root = self.bucket_root();
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => Ok(root),
            Ok(_) => Err(ObjectStoreError::BucketNotFound(self.bucket.clone())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::BucketNotFound(self.bucket.clone()))
            }
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    fn not_found(&self, key: &str) -> ObjectStoreError {
        ObjectStoreError::ObjectNotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
    }

    /// Remove empty directories from `start` upwards, stopping at `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    /// Write to a temp file, fsync, then rename over the final path.
    async fn put(&self, key: &str, data: Bytes) -> ObjectStoreResult<()> {
        Self::ensure_key_valid(key)?;
        self.ensure_bucket().await?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ObjectStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ObjectStoreError::Io(err));
            }
        }

        debug!("stored {} bytes at {}", data.len(), file_path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> ObjectStoreResult<Bytes> {
        Self::ensure_key_valid(key)?;
        self.ensure_bucket().await?;

        let file_path = self.object_path(key);
        match fs::read(&file_path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(self.not_found(key)),
            Err(err) => Err(ObjectStoreError::Io(err)),
        }
    }

    async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_valid(key)?;
        let bucket_root = self.ensure_bucket().await?;

        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(ObjectStoreError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &bucket_root).await;
        }
        Ok(())
    }

    /// Write, read back and remove a probe file inside the bucket.
    async fn health_check(&self) -> ObjectStoreResult<()> {
        let root = self.ensure_bucket().await?;
        let probe = root.join(format!(".readyz-{}", Uuid::new_v4()));

        fs::write(&probe, b"readyz").await?;
        let read = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;

        if read? == b"readyz" {
            Ok(())
        } else {
            Err(ObjectStoreError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )))
        }
    }
}
