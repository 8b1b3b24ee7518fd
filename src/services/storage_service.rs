//! src/services/storage_service.rs
//!
//! StorageService: upload, download and listing pipelines over the object
//! catalog (metadata) and the chunk store (payload). Both collaborators are
//! injected as trait objects so the pipelines never care which engine sits
//! underneath.

use crate::{
    models::object::ObjectRecord,
    services::{
        catalog::Catalog,
        chunk_store::{ChunkReader, ChunkStore, open_reader, open_writer},
    },
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Default chunk size: 255 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

const MAX_FILENAME_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    ObjectNotFound(Uuid),
    #[error("writing chunk {index} of object `{object_id}` failed: {reason}")]
    ChunkWrite {
        object_id: Uuid,
        index: u32,
        reason: String,
    },
    #[error("catalog write failed: {0}")]
    CatalogWrite(String),
    #[error("reading chunk {index} of object `{object_id}` failed: {reason}")]
    ChunkRead {
        object_id: Uuid,
        index: u32,
        reason: String,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Pipeline outcomes the caller is expected to handle, plus wrapped storage
/// failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no file provided")]
    NoFileProvided,
    #[error("invalid filename: {0}")]
    InvalidFilename(&'static str),
    #[error("file `{0}` not found")]
    FileNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Clone)]
pub struct StorageService {
    catalog: Arc<dyn Catalog>,
    chunks: Arc<dyn ChunkStore>,
    chunk_size: usize,
}

impl StorageService {
    pub fn new(catalog: Arc<dyn Catalog>, chunks: Arc<dyn ChunkStore>, chunk_size: usize) -> Self {
        Self {
            catalog,
            chunks,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Store `data` under a new object.
    ///
    /// The record becomes visible only after every chunk is written; any
    /// failure discards the chunks written so far and leaves the catalog
    /// untouched.
    pub async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        data: Bytes,
    ) -> ServiceResult<ObjectRecord> {
        if data.is_empty() {
            return Err(ServiceError::NoFileProvided);
        }
        ensure_filename_valid(filename)?;

        let object_id = Uuid::new_v4();
        let mut writer = open_writer(
            self.chunks.clone(),
            self.catalog.clone(),
            object_id,
            self.chunk_size,
        );

        if let Err(err) = writer.write(data).await {
            warn!(%object_id, filename, "upload failed while writing chunks: {}", err);
            writer.abort().await;
            return Err(err.into());
        }

        let record = writer
            .finalize(filename, content_type)
            .await
            .inspect_err(|err| {
                warn!(%object_id, filename, "upload failed while finalizing: {}", err);
            })?;

        info!(
            object_id = %record.id,
            filename = %record.filename,
            length = record.length,
            chunks = record.expected_chunks(),
            "upload committed"
        );
        Ok(record)
    }

    /// Resolve `filename` and open an ordered reader over its chunks.
    ///
    /// Nothing is read beyond the chunk count until the caller polls the
    /// reader.
    pub async fn open_download(&self, filename: &str) -> ServiceResult<(ObjectRecord, ChunkReader)> {
        let record = self
            .catalog
            .find_by_filename(filename)
            .await?
            .ok_or_else(|| ServiceError::FileNotFound(filename.to_string()))?;

        let reader = open_reader(self.chunks.clone(), record.id).await?;
        let expected = record.expected_chunks();
        if reader.chunk_count() != expected {
            return Err(StorageError::ChunkRead {
                object_id: record.id,
                index: reader.chunk_count().min(expected),
                reason: format!(
                    "found {} chunks, record expects {}",
                    reader.chunk_count(),
                    expected
                ),
            }
            .into());
        }

        Ok((record, reader))
    }

    /// Every stored record, metadata only.
    pub async fn list(&self) -> ServiceResult<Vec<ObjectRecord>> {
        Ok(self.catalog.list_all().await?)
    }
}

/// Reject filenames that cannot be addressed or logged sanely.
fn ensure_filename_valid(filename: &str) -> ServiceResult<()> {
    if filename.is_empty() {
        return Err(ServiceError::InvalidFilename("must not be empty"));
    }
    if filename.len() > MAX_FILENAME_LEN {
        return Err(ServiceError::InvalidFilename("longer than 1024 bytes"));
    }
    if filename.chars().any(char::is_control) {
        return Err(ServiceError::InvalidFilename(
            "must not contain control characters",
        ));
    }
    Ok(())
}
