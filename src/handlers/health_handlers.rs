//! Liveness and readiness probes. Neither requires a token.

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

#[derive(Serialize)]
pub struct Liveness {
    status: &'static str,
}

#[derive(Serialize)]
pub struct Readiness {
    status: &'static str,
    catalog: Probe,
}

#[derive(Serialize)]
struct Probe {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `GET /healthz`: the process is up. Never touches storage.
pub async fn healthz() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

/// `GET /readyz`: 200 while the catalog answers its probe query, 503 otherwise.
pub async fn readyz(State(service): State<StorageService>) -> (StatusCode, Json<Readiness>) {
    match service.catalog().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ok",
                catalog: Probe {
                    ok: true,
                    error: None,
                },
            }),
        ),
        Err(err) => {
            tracing::warn!("readiness probe failed: {}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "unavailable",
                    catalog: Probe {
                        ok: false,
                        error: Some(err.to_string()),
                    },
                }),
            )
        }
    }
}
