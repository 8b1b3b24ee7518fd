//! Object catalog: the metadata half of the store.

use crate::{
    models::object::{NewObjectRecord, ObjectRecord},
    services::storage_service::{StorageError, StorageResult},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Metadata records addressable by filename.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Commit a record. The id was minted by the chunk writer; the catalog
    /// stamps the creation time.
    async fn insert(&self, record: NewObjectRecord) -> StorageResult<ObjectRecord>;

    /// Exact, case-sensitive lookup. With duplicate filenames the first
    /// inserted record wins.
    async fn find_by_filename(&self, filename: &str) -> StorageResult<Option<ObjectRecord>>;

    /// Every record in insertion order, materialized at call time.
    async fn list_all(&self) -> StorageResult<Vec<ObjectRecord>>;

    async fn health_check(&self) -> StorageResult<()>;
}

#[derive(Clone)]
pub struct SqliteCatalog {
    db: Arc<SqlitePool>,
}

impl SqliteCatalog {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn insert(&self, record: NewObjectRecord) -> StorageResult<ObjectRecord> {
        sqlx::query_as::<_, ObjectRecord>(
            r#"
            INSERT INTO objects (id, filename, length, chunk_size, content_type, md5, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, filename, length, chunk_size, content_type, md5, created_at
            "#,
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(record.length)
        .bind(record.chunk_size)
        .bind(&record.content_type)
        .bind(&record.md5)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| StorageError::CatalogWrite(err.to_string()))
    }

    async fn find_by_filename(&self, filename: &str) -> StorageResult<Option<ObjectRecord>> {
        let record = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, filename, length, chunk_size, content_type, md5, created_at
             FROM objects WHERE filename = ? ORDER BY seq ASC LIMIT 1",
        )
        .bind(filename)
        .fetch_optional(&*self.db)
        .await?;
        Ok(record)
    }

    async fn list_all(&self) -> StorageResult<Vec<ObjectRecord>> {
        let records = sqlx::query_as::<_, ObjectRecord>(
            "SELECT id, filename, length, chunk_size, content_type, md5, created_at
             FROM objects ORDER BY seq ASC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(records)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&*self.db).await?;
        if one != 1 {
            return Err(StorageError::Unavailable(format!(
                "unexpected probe result: {}",
                one
            )));
        }
        Ok(())
    }
}
