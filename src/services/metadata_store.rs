//! src/services/metadata_store.rs
//!
//! Image metadata table keyed by `id`: point put/get/delete plus a full scan
//! with exact-match attribute filters. `SqliteMetadataStore` keeps the rows
//! in a single SQLite table whose name comes from configuration.

use crate::models::image::{ImageFilter, ImageRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use sqlx::{FromRow, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MetadataStoreError {
    #[error("table name `{0}` is invalid")]
    InvalidTableName(String),
    #[error("metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataStoreResult<T> = Result<T, MetadataStoreError>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record, replacing any row with the same `id`.
    async fn put(&self, record: &ImageRecord) -> MetadataStoreResult<()>;
    async fn get(&self, id: &str) -> MetadataStoreResult<Option<ImageRecord>>;
    /// Deleting an absent `id` succeeds.
    async fn delete(&self, id: &str) -> MetadataStoreResult<()>;
    /// Every record matching all set fields of `filter`, in store order.
    async fn scan(&self, filter: &ImageFilter) -> MetadataStoreResult<Vec<ImageRecord>>;
    async fn health_check(&self) -> MetadataStoreResult<()>;
}

const TABLE_NAME_MAX_LEN: usize = 64;

#[derive(FromRow)]
struct ImageRow {
    id: String,
    file_name: String,
    metadata: String,
    created_at: NaiveDate,
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = MetadataStoreError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let metadata: Map<String, Value> = serde_json::from_str(&row.metadata)?;
        Ok(ImageRecord {
            id: row.id,
            file_name: row.file_name,
            metadata,
            created_at: row.created_at,
        })
    }
}

/// SQLite-backed metadata table.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    /// Double-quoted table identifier, ready to splice into SQL.
    table: String,
}

impl SqliteMetadataStore {
    /// Validates `table` before it is ever interpolated into a statement.
    pub fn new(db: Arc<SqlitePool>, table: &str) -> MetadataStoreResult<Self> {
        ensure_table_name_safe(table)?;
        Ok(Self {
            db,
            table: format!("\"{}\"", table),
        })
    }

    /// Create the table and its `file_name` index if they do not exist yet.
    pub async fn migrate(&self) -> MetadataStoreResult<()> {
        let index = format!("\"{}_file_name_idx\"", self.table.trim_matches('"'));
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY NOT NULL,
                    file_name TEXT NOT NULL,
                    metadata TEXT NOT NULL DEFAULT '{{}}',
                    created_at TEXT NOT NULL
                )",
                self.table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (file_name)",
                index, self.table
            ),
        ];

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(&stmt).execute(&*self.db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put(&self, record: &ImageRecord) -> MetadataStoreResult<()> {
        let metadata = serde_json::to_string(&record.metadata)?;
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {} (id, file_name, metadata, created_at)
             VALUES (?, ?, ?, ?)",
            self.table
        ))
        .bind(&record.id)
        .bind(&record.file_name)
        .bind(metadata)
        .bind(record.created_at)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> MetadataStoreResult<Option<ImageRecord>> {
        let row = sqlx::query_as::<_, ImageRow>(&format!(
            "SELECT id, file_name, metadata, created_at FROM {} WHERE id = ?",
            self.table
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;

        row.map(ImageRecord::try_from).transpose()
    }

    async fn delete(&self, id: &str) -> MetadataStoreResult<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id)
            .execute(&*self.db)
            .await?;
        debug!("deleted {} row(s) for id {}", result.rows_affected(), id);
        Ok(())
    }

    async fn scan(&self, filter: &ImageFilter) -> MetadataStoreResult<Vec<ImageRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT id, file_name, metadata, created_at FROM {}",
            self.table
        ));

        let mut joiner = " WHERE ";
        if let Some(file_name) = &filter.file_name {
            builder.push(joiner).push("file_name = ");
            builder.push_bind(file_name.clone());
            joiner = " AND ";
        }
        if let Some(created_at) = &filter.created_at {
            builder.push(joiner).push("created_at = ");
            builder.push_bind(created_at.clone());
        }

        let rows: Vec<ImageRow> = builder.build_query_as().fetch_all(&*self.db).await?;
        rows.into_iter().map(ImageRecord::try_from).collect()
    }

    async fn health_check(&self) -> MetadataStoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

/// Table names are spliced into SQL, so only a conservative character set
/// is accepted: a leading letter or underscore, then letters, digits,
/// underscores or hyphens.
fn ensure_table_name_safe(name: &str) -> MetadataStoreResult<()> {
    let invalid = || MetadataStoreError::InvalidTableName(name.to_string());

    if name.is_empty() || name.len() > TABLE_NAME_MAX_LEN {
        return Err(invalid());
    }
    let mut chars = name.chars();
    if !chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    {
        return Err(invalid());
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(invalid());
    }
    Ok(())
}
