//! Chunked payload storage.
//!
//! Payloads live in the `chunks` table keyed by `(object_id, idx)`. Writes go
//! through [`ChunkWriter`], which slices incoming bytes into fixed-size
//! chunks and only commits a catalog record from [`ChunkWriter::finalize`].
//! Reads go through [`ChunkReader`], which fetches one chunk per poll in
//! ascending index order.

use crate::{
    models::{
        chunk::Chunk,
        object::{NewObjectRecord, ObjectRecord},
    },
    services::{
        catalog::Catalog,
        storage_service::{StorageError, StorageResult},
    },
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Chunk payload primitive: keyed put/get with no ordering logic of its own.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Durably persist one chunk. Rewriting an existing `(object_id, index)`
    /// is an error.
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()>;

    async fn get_chunk(&self, object_id: Uuid, index: u32) -> StorageResult<Option<Chunk>>;

    async fn chunk_count(&self, object_id: Uuid) -> StorageResult<u32>;

    async fn delete_chunks(&self, object_id: Uuid) -> StorageResult<()>;
}

#[derive(Clone)]
pub struct SqliteChunkStore {
    db: Arc<SqlitePool>,
}

impl SqliteChunkStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()> {
        sqlx::query("INSERT INTO chunks (object_id, idx, data) VALUES (?, ?, ?)")
            .bind(chunk.object_id)
            .bind(i64::from(chunk.index))
            .bind(&chunk.data[..])
            .execute(&*self.db)
            .await
            .map_err(|err| StorageError::ChunkWrite {
                object_id: chunk.object_id,
                index: chunk.index,
                reason: err.to_string(),
            })?;
        Ok(())
    }

    async fn get_chunk(&self, object_id: Uuid, index: u32) -> StorageResult<Option<Chunk>> {
        let data: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT data FROM chunks WHERE object_id = ? AND idx = ?")
                .bind(object_id)
                .bind(i64::from(index))
                .fetch_optional(&*self.db)
                .await
                .map_err(|err| StorageError::ChunkRead {
                    object_id,
                    index,
                    reason: err.to_string(),
                })?;
        Ok(data.map(|data| Chunk::new(object_id, index, Bytes::from(data))))
    }

    async fn chunk_count(&self, object_id: Uuid) -> StorageResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE object_id = ?")
            .bind(object_id)
            .fetch_one(&*self.db)
            .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn delete_chunks(&self, object_id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM chunks WHERE object_id = ?")
            .bind(object_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }
}

/// Start a write for a freshly minted `object_id`.
pub fn open_writer(
    store: Arc<dyn ChunkStore>,
    catalog: Arc<dyn Catalog>,
    object_id: Uuid,
    chunk_size: usize,
) -> ChunkWriter {
    ChunkWriter {
        store,
        catalog,
        object_id,
        chunk_size: chunk_size.max(1),
        pending: BytesMut::new(),
        next_index: 0,
        length: 0,
        digest: Context::new(),
    }
}

/// Open an ordered read over every chunk of `object_id`.
///
/// Fails with `ObjectNotFound` when the object has no chunks.
pub async fn open_reader(store: Arc<dyn ChunkStore>, object_id: Uuid) -> StorageResult<ChunkReader> {
    let total = store.chunk_count(object_id).await?;
    if total == 0 {
        return Err(StorageError::ObjectNotFound(object_id));
    }
    Ok(ChunkReader {
        store,
        object_id,
        next_index: 0,
        total,
    })
}

/// Append-only writer that slices bytes into chunks of `chunk_size`.
///
/// Each full chunk is persisted before `write` returns. The trailing partial
/// chunk is held in memory until more bytes arrive or `finalize` is called.
pub struct ChunkWriter {
    store: Arc<dyn ChunkStore>,
    catalog: Arc<dyn Catalog>,
    object_id: Uuid,
    chunk_size: usize,
    pending: BytesMut,
    next_index: u32,
    length: u64,
    digest: Context,
}

impl ChunkWriter {
    pub async fn write(&mut self, mut data: Bytes) -> StorageResult<()> {
        self.length += data.len() as u64;
        self.digest.consume(&data);

        if !self.pending.is_empty() {
            let take = (self.chunk_size - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data.split_to(take));
            if self.pending.len() < self.chunk_size {
                return Ok(());
            }
            let full = self.pending.split().freeze();
            self.flush_chunk(full).await?;
        }

        while data.len() >= self.chunk_size {
            let full = data.split_to(self.chunk_size);
            self.flush_chunk(full).await?;
        }

        if !data.is_empty() {
            self.pending.extend_from_slice(&data);
        }
        Ok(())
    }

    /// Flush the tail and commit the catalog record. This is the only way a
    /// record for `object_id` comes into existence; on failure the chunks
    /// written so far are discarded.
    pub async fn finalize(
        mut self,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> StorageResult<ObjectRecord> {
        match self.commit(filename.into(), content_type.into()).await {
            Ok(record) => Ok(record),
            Err(err) => {
                self.abort().await;
                Err(err)
            }
        }
    }

    async fn commit(&mut self, filename: String, content_type: String) -> StorageResult<ObjectRecord> {
        if !self.pending.is_empty() {
            let tail = self.pending.split().freeze();
            self.flush_chunk(tail).await?;
        }

        let length = i64::try_from(self.length)
            .map_err(|_| StorageError::CatalogWrite("object length overflows i64".into()))?;
        let digest = std::mem::replace(&mut self.digest, Context::new()).compute();
        let record = NewObjectRecord {
            id: self.object_id,
            filename,
            length,
            chunk_size: self.chunk_size as i64,
            content_type,
            md5: format!("{:x}", digest),
        };
        self.catalog.insert(record).await
    }

    /// Drop whatever was written. No record refers to these chunks, so a
    /// failed cleanup only leaves unreachable rows behind.
    pub async fn abort(self) {
        if self.next_index == 0 {
            return;
        }
        match self.store.delete_chunks(self.object_id).await {
            Ok(()) => debug!(
                object_id = %self.object_id,
                chunks = self.next_index,
                "discarded chunks of aborted upload"
            ),
            Err(err) => warn!(
                object_id = %self.object_id,
                "failed to discard chunks of aborted upload: {}",
                err
            ),
        }
    }

    async fn flush_chunk(&mut self, data: Bytes) -> StorageResult<()> {
        let index = self.next_index;
        let size = data.len();
        let result = self
            .store
            .put_chunk(Chunk::new(self.object_id, index, data))
            .await;
        // Count the attempt so `abort` also cleans up a half-applied write.
        self.next_index += 1;
        match result {
            Ok(()) => {
                debug!(object_id = %self.object_id, index, size, "wrote chunk");
                Ok(())
            }
            Err(err @ StorageError::ChunkWrite { .. }) => Err(err),
            Err(other) => Err(StorageError::ChunkWrite {
                object_id: self.object_id,
                index,
                reason: other.to_string(),
            }),
        }
    }
}

/// Lazy, finite, non-restartable reader over an object's chunks.
pub struct ChunkReader {
    store: Arc<dyn ChunkStore>,
    object_id: Uuid,
    next_index: u32,
    total: u32,
}

impl ChunkReader {
    pub fn chunk_count(&self) -> u32 {
        self.total
    }

    /// Fetch the next chunk, or `None` once every chunk has been yielded.
    pub async fn next_chunk(&mut self) -> StorageResult<Option<Bytes>> {
        if self.next_index >= self.total {
            return Ok(None);
        }
        let index = self.next_index;
        let chunk = match self.store.get_chunk(self.object_id, index).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                self.total = index;
                return Err(StorageError::ChunkRead {
                    object_id: self.object_id,
                    index,
                    reason: "chunk missing".into(),
                });
            }
            Err(err) => {
                self.total = index;
                return Err(match err {
                    err @ StorageError::ChunkRead { .. } => err,
                    other => StorageError::ChunkRead {
                        object_id: self.object_id,
                        index,
                        reason: other.to_string(),
                    },
                });
            }
        };
        self.next_index += 1;
        Ok(Some(chunk.data))
    }

    /// Adapt into a `Stream` that reads a chunk only when polled, which lets
    /// the HTTP body apply back-pressure. The stream ends after the first
    /// error.
    pub fn into_stream(self) -> impl Stream<Item = StorageResult<Bytes>> + Send + 'static {
        stream::try_unfold(self, |mut reader| async move {
            let next = reader.next_chunk().await?;
            Ok::<_, StorageError>(next.map(|bytes| (bytes, reader)))
        })
    }
}

impl Drop for ChunkReader {
    fn drop(&mut self) {
        if self.next_index < self.total {
            debug!(
                object_id = %self.object_id,
                read = self.next_index,
                total = self.total,
                "chunk reader dropped before completion"
            );
        }
    }
}
