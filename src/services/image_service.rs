//! src/services/image_service.rs
//!
//! ImageService — the store-facing half of the four image operations. It
//! owns handles to the object store and the metadata store and sequences the
//! two calls each operation needs. Request parsing and envelope formatting
//! live in `handlers::image_handlers`.

use crate::{
    errors::AppError,
    models::image::{ImageFilter, ImageRecord},
    services::{metadata_store::MetadataStore, object_store::ObjectStore},
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const IMAGE_NOT_FOUND: &str = "Image not found";

/// Store clients built once at startup and shared by every invocation.
#[derive(Clone)]
pub struct ImageService {
    pub objects: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl ImageService {
    pub fn new(objects: Arc<dyn ObjectStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    /// Write the blob under `file_name`, then record a fresh id for it.
    ///
    /// An existing blob with the same name is overwritten and any records
    /// already pointing at it now resolve to the new content.
    pub async fn upload(
        &self,
        file_name: &str,
        content: Bytes,
        metadata: Map<String, Value>,
    ) -> Result<ImageRecord, AppError> {
        let id = Uuid::new_v4().to_string();

        self.objects.put(file_name, content).await?;

        let record = ImageRecord {
            id,
            file_name: file_name.to_string(),
            metadata,
            created_at: Utc::now().date_naive(),
        };
        self.metadata.put(&record).await?;

        info!("uploaded image {} as {}", record.file_name, record.id);
        Ok(record)
    }

    pub async fn list(&self, filter: &ImageFilter) -> Result<Vec<ImageRecord>, AppError> {
        let images = self.metadata.scan(filter).await?;
        if filter.is_empty() {
            debug!("full scan returned {} image(s)", images.len());
        } else {
            debug!("scan with {:?} matched {} image(s)", filter, images.len());
        }
        Ok(images)
    }

    /// Look up a record and read its blob.
    ///
    /// Any store failure on this path is reported as not found, not only a
    /// missing record or key.
    pub async fn get(&self, id: &str) -> Result<(ImageRecord, Bytes), AppError> {
        let record = self.lookup(id).await?;

        let content = self
            .objects
            .get(&record.file_name)
            .await
            .map_err(|err| {
                warn!("object fetch for {} failed: {}", record.file_name, err);
                AppError::not_found(err.to_string())
            })?;

        Ok((record, content))
    }

    /// Remove the blob, then the record. Other records sharing the blob's
    /// `file_name` are left in place.
    pub async fn delete(&self, id: &str) -> Result<ImageRecord, AppError> {
        let record = self.lookup(id).await?;

        self.objects
            .delete(&record.file_name)
            .await
            .map_err(|err| {
                warn!("object delete for {} failed: {}", record.file_name, err);
                AppError::not_found(err.to_string())
            })?;

        self.metadata.delete(&record.id).await.map_err(|err| {
            warn!("metadata delete for {} failed: {}", record.id, err);
            AppError::not_found(err.to_string())
        })?;

        info!("deleted image {} ({})", record.id, record.file_name);
        Ok(record)
    }

    async fn lookup(&self, id: &str) -> Result<ImageRecord, AppError> {
        match self.metadata.get(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => {
                debug!("no image with id {}", id);
                Err(AppError::not_found(IMAGE_NOT_FOUND))
            }
            Err(err) => {
                warn!("metadata lookup for {} failed: {}", id, err);
                Err(AppError::not_found(err.to_string()))
            }
        }
    }
}
