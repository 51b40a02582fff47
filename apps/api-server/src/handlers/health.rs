//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::observability::RequestId;
use crate::state::{AppState, Storage};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    pub storage: &'static str,
    pub request_id: String,
}

/// Health check endpoint - returns server status.
///
/// GET /api/health
///
/// Reports `degraded` with a 503 when the database stops answering.
pub async fn health_check(state: web::Data<AppState>, request_id: RequestId) -> HttpResponse {
    let healthy = match &state.storage {
        Storage::Memory => true,
        #[cfg(feature = "postgres")]
        Storage::Postgres(db) => match db.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Database ping failed");
                false
            }
        },
    };

    let response = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        storage: state.storage.name(),
        request_id: request_id.as_str().to_owned(),
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
