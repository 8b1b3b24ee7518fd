//! A slice of an object's payload.

use bytes::Bytes;
use uuid::Uuid;

/// One stored chunk. For a given `object_id` the indices form the contiguous
/// range `0..n`, and concatenating the chunks in index order yields the
/// original payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Chunk {
    pub object_id: Uuid,
    pub index: u32,
    pub data: Bytes,
}

impl Chunk {
    pub fn new(object_id: Uuid, index: u32, data: Bytes) -> Self {
        Self {
            object_id,
            index,
            data,
        }
    }
}
