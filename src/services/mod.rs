pub mod image_service;
pub mod metadata_store;
pub mod object_store;

#[cfg(test)]
pub(crate) mod test_support {
    use super::{
        image_service::ImageService,
        metadata_store::{
            MetadataStore, MetadataStoreError, MetadataStoreResult, SqliteMetadataStore,
        },
        object_store::{LocalObjectStore, ObjectStore, ObjectStoreError, ObjectStoreResult},
    };
    use crate::models::image::{ImageFilter, ImageRecord};
    use async_trait::async_trait;
    use bytes::Bytes;
    use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
    use std::{io, sync::Arc};
    use tempfile::TempDir;

    /// In-memory SQLite; one connection so every query sees the same database.
    pub async fn memory_pool() -> Arc<SqlitePool> {
        Arc::new(
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap(),
        )
    }

    /// Service over a temp-dir bucket and a migrated in-memory table. Keep the
    /// `TempDir` alive for the duration of the test.
    pub async fn local_service() -> (TempDir, ImageService) {
        let dir = tempfile::tempdir().unwrap();
        let objects = LocalObjectStore::new(dir.path(), "images-bucket");
        objects.create_bucket().await.unwrap();
        let metadata = SqliteMetadataStore::new(memory_pool().await, "images-metadata").unwrap();
        metadata.migrate().await.unwrap();
        (dir, ImageService::new(Arc::new(objects), Arc::new(metadata)))
    }

    fn injected() -> io::Error {
        io::Error::other("injected failure")
    }

    pub struct FailingObjectStore;

    #[async_trait]
    impl ObjectStore for FailingObjectStore {
        async fn put(&self, _key: &str, _data: Bytes) -> ObjectStoreResult<()> {
            Err(ObjectStoreError::Io(injected()))
        }
        async fn get(&self, _key: &str) -> ObjectStoreResult<Bytes> {
            Err(ObjectStoreError::Io(injected()))
        }
        async fn delete(&self, _key: &str) -> ObjectStoreResult<()> {
            Err(ObjectStoreError::Io(injected()))
        }
        async fn health_check(&self) -> ObjectStoreResult<()> {
            Err(ObjectStoreError::Io(injected()))
        }
    }

    pub struct FailingMetadataStore;

    #[async_trait]
    impl MetadataStore for FailingMetadataStore {
        async fn put(&self, _record: &ImageRecord) -> MetadataStoreResult<()> {
            Err(MetadataStoreError::Sqlx(sqlx::Error::PoolClosed))
        }
        async fn get(&self, _id: &str) -> MetadataStoreResult<Option<ImageRecord>> {
            Err(MetadataStoreError::Sqlx(sqlx::Error::PoolClosed))
        }
        async fn delete(&self, _id: &str) -> MetadataStoreResult<()> {
            Err(MetadataStoreError::Sqlx(sqlx::Error::PoolClosed))
        }
        async fn scan(&self, _filter: &ImageFilter) -> MetadataStoreResult<Vec<ImageRecord>> {
            Err(MetadataStoreError::Sqlx(sqlx::Error::PoolClosed))
        }
        async fn health_check(&self) -> MetadataStoreResult<()> {
            Err(MetadataStoreError::Sqlx(sqlx::Error::PoolClosed))
        }
    }
}
