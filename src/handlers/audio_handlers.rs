//! HTTP handlers for audio upload, download and listing.
//! Downloads stream chunk by chunk straight from the chunk store; uploads are
//! buffered by the multipart extractor and handed to `StorageService`.

use crate::{
    auth::Principal,
    errors::AppError,
    models::object::ObjectRecord,
    services::storage_service::{ServiceError, StorageService},
};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{info, warn};

/// Multipart field that carries the file.
pub const UPLOAD_FIELD: &str = "audio";

/// Content type recorded when the part does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/wav";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
}

/// `POST /audio/upload`: store the `audio` part of a multipart body.
pub async fn upload_audio(
    State(service): State<StorageService>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let data = field.bytes().await?;
        upload = Some((filename, content_type, data));
        break;
    }

    let Some((filename, content_type, data)) = upload else {
        return Err(ServiceError::NoFileProvided.into());
    };

    let record = service.upload(&filename, &content_type, data).await?;
    info!(
        user = %principal.id,
        object_id = %record.id,
        filename = %record.filename,
        "audio uploaded"
    );

    Ok((
        StatusCode::OK,
        Json(UploadResponse {
            message: "File uploaded successfully".into(),
            filename: record.filename,
        }),
    ))
}

/// `GET /audio/file/{filename}`: stream the first object stored under
/// `filename`.
///
/// Headers go out before the first chunk is read. A read failure after that
/// point ends the body with an error, which makes hyper abort the
/// connection instead of finishing a short response.
pub async fn get_audio_file(
    State(service): State<StorageService>,
    Extension(principal): Extension<Principal>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let (record, reader) = service.open_download(&filename).await?;
    info!(
        user = %principal.id,
        object_id = %record.id,
        filename = %record.filename,
        chunks = reader.chunk_count(),
        "streaming audio"
    );

    let object_id = record.id;
    let stream = reader.into_stream().inspect_err(move |err| {
        warn!(%object_id, "download aborted mid-stream: {}", err);
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &record);
    Ok(response)
}

/// `GET /audio/files`: metadata of every stored object.
pub async fn list_audio_files(
    State(service): State<StorageService>,
) -> Result<Json<Vec<ObjectRecord>>, AppError> {
    let records = service.list().await?;
    if records.is_empty() {
        return Err(AppError::not_found("No files found"));
    }
    Ok(Json(records))
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectRecord) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.length.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.md5)) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
