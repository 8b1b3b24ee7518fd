//! Core data models for the audio object store.
//!
//! `ObjectRecord` maps to the `objects` table via `sqlx::FromRow` and
//! serializes as JSON for the listing endpoint. `Chunk` is the unit the
//! chunk store reads and writes.

pub mod chunk;
pub mod object;
