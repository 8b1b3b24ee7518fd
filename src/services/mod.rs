//! Storage services: catalog, chunk store and the pipelines built on them.

pub mod catalog;
pub mod chunk_store;
pub mod storage_service;
