//! Test doubles wrapping the real stores: call counters and injected
//! failures.

use crate::{
    auth::Claims,
    models::{
        chunk::Chunk,
        object::{NewObjectRecord, ObjectRecord},
    },
    services::{
        catalog::Catalog,
        chunk_store::ChunkStore,
        storage_service::{StorageError, StorageResult},
    },
};
use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// HS256 token with the claims the gate expects.
pub fn sign_token(secret: &[u8], id: &str, exp: u64) -> String {
    let claims = Claims {
        id: id.to_string(),
        exp,
        iat: Some(now_secs()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// Counts every call that reaches the chunk store.
pub struct CountingChunkStore {
    inner: Arc<dyn ChunkStore>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    other: AtomicUsize,
}

impl CountingChunkStore {
    pub fn new(inner: Arc<dyn ChunkStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            other: AtomicUsize::new(0),
        }
    }

    /// `get_chunk` calls.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// `put_chunk` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.reads() + self.writes() + self.other.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkStore for CountingChunkStore {
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put_chunk(chunk).await
    }

    async fn get_chunk(&self, object_id: Uuid, index: u32) -> StorageResult<Option<Chunk>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_chunk(object_id, index).await
    }

    async fn chunk_count(&self, object_id: Uuid) -> StorageResult<u32> {
        self.other.fetch_add(1, Ordering::SeqCst);
        self.inner.chunk_count(object_id).await
    }

    async fn delete_chunks(&self, object_id: Uuid) -> StorageResult<()> {
        self.other.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_chunks(object_id).await
    }
}

/// Counts every call that reaches the catalog.
pub struct CountingCatalog {
    inner: Arc<dyn Catalog>,
    calls: AtomicUsize,
}

impl CountingCatalog {
    pub fn new(inner: Arc<dyn Catalog>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for CountingCatalog {
    async fn insert(&self, record: NewObjectRecord) -> StorageResult<ObjectRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(record).await
    }

    async fn find_by_filename(&self, filename: &str) -> StorageResult<Option<ObjectRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_filename(filename).await
    }

    async fn list_all(&self) -> StorageResult<Vec<ObjectRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_all().await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

/// Fails every `put_chunk` at or beyond `fail_at` and every `get_chunk` at
/// or beyond `fail_reads_at`; everything else passes through.
pub struct FailingChunkStore {
    inner: Arc<dyn ChunkStore>,
    fail_at: u32,
    fail_reads_at: u32,
}

impl FailingChunkStore {
    pub fn new(inner: Arc<dyn ChunkStore>, fail_at: u32) -> Self {
        Self {
            inner,
            fail_at,
            fail_reads_at: u32::MAX,
        }
    }

    pub fn failing_reads(inner: Arc<dyn ChunkStore>, fail_reads_at: u32) -> Self {
        Self {
            inner,
            fail_at: u32::MAX,
            fail_reads_at,
        }
    }
}

#[async_trait]
impl ChunkStore for FailingChunkStore {
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<()> {
        if chunk.index >= self.fail_at {
            return Err(StorageError::ChunkWrite {
                object_id: chunk.object_id,
                index: chunk.index,
                reason: "injected failure".into(),
            });
        }
        self.inner.put_chunk(chunk).await
    }

    async fn get_chunk(&self, object_id: Uuid, index: u32) -> StorageResult<Option<Chunk>> {
        if index >= self.fail_reads_at {
            return Err(StorageError::ChunkRead {
                object_id,
                index,
                reason: "injected failure".into(),
            });
        }
        self.inner.get_chunk(object_id, index).await
    }

    async fn chunk_count(&self, object_id: Uuid) -> StorageResult<u32> {
        self.inner.chunk_count(object_id).await
    }

    async fn delete_chunks(&self, object_id: Uuid) -> StorageResult<()> {
        self.inner.delete_chunks(object_id).await
    }
}

/// Rejects every insert; reads pass through.
pub struct FailingCatalog {
    inner: Arc<dyn Catalog>,
}

impl FailingCatalog {
    pub fn new(inner: Arc<dyn Catalog>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Catalog for FailingCatalog {
    async fn insert(&self, _record: NewObjectRecord) -> StorageResult<ObjectRecord> {
        Err(StorageError::CatalogWrite("injected failure".into()))
    }

    async fn find_by_filename(&self, filename: &str) -> StorageResult<Option<ObjectRecord>> {
        self.inner.find_by_filename(filename).await
    }

    async fn list_all(&self) -> StorageResult<Vec<ObjectRecord>> {
        self.inner.list_all().await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}
