//! Defines routes for the audio store.
//!
//! ## Structure
//! - **Public endpoints**
//!   - `GET  /healthz` - liveness
//!   - `GET  /readyz`  - readiness
//!
//! - **Protected endpoints** (bearer token required)
//!   - `POST /audio/upload`           - multipart upload, field `audio`
//!   - `GET  /audio/file/{filename}`  - stream a stored file
//!   - `GET  /audio/files`            - list stored metadata
//!
//! The auth gate is a `route_layer`, so it only wraps matched protected
//! routes and runs before their extractors touch the body or storage.

use crate::{
    auth::{TokenVerifier, require_auth},
    handlers::{
        audio_handlers::{get_audio_file, list_audio_files, upload_audio},
        health_handlers::{healthz, readyz},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;

/// Build and return the router for all audio-store routes.
///
/// The router carries shared state (`StorageService`) to all handlers; the
/// verifier is owned by the auth middleware.
pub fn routes(verifier: Arc<TokenVerifier>, max_upload_bytes: usize) -> Router<StorageService> {
    let protected = Router::new()
        .route(
            "/audio/upload",
            post(upload_audio).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/audio/file/{filename}", get(get_audio_file))
        .route("/audio/files", get(list_audio_files))
        .route_layer(middleware::from_fn_with_state(verifier, require_auth));

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .merge(protected)
}
