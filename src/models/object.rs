//! Represents a stored audio object (the catalog entry, not its bytes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata record for one stored blob.
///
/// A record only exists once every chunk of its payload has been written,
/// so `length` always matches the sum of the chunk sizes stored under `id`.
/// Records are never updated after insertion.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    /// Identifier minted when the upload started; chunks are keyed by it.
    pub id: Uuid,

    /// Filename declared by the uploader. Not unique.
    pub filename: String,

    /// Total payload size in bytes.
    pub length: i64,

    /// Size of every chunk except possibly the last.
    pub chunk_size: i64,

    /// Content type (MIME type) declared at upload time.
    pub content_type: String,

    /// Hex MD5 digest of the whole payload.
    pub md5: String,

    /// When the record was committed to the catalog.
    pub created_at: DateTime<Utc>,
}

impl ObjectRecord {
    /// Number of chunks implied by `length` and `chunk_size`.
    pub fn expected_chunks(&self) -> u32 {
        if self.length <= 0 || self.chunk_size <= 0 {
            return 0;
        }
        let count = (self.length + self.chunk_size - 1) / self.chunk_size;
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Everything the catalog needs to commit a record; `created_at` is stamped
/// by the catalog itself.
#[derive(Clone, Debug)]
pub struct NewObjectRecord {
    pub id: Uuid,
    pub filename: String,
    pub length: i64,
    pub chunk_size: i64,
    pub content_type: String,
    pub md5: String,
}
