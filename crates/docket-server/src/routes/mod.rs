pub mod archive;
pub mod attachments;
pub mod categories;
mod form;
pub mod health;
pub mod tags;
pub mod tasks;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Json, Router};
use docket_service::{LocalService, ServiceError};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

pub struct InnerAppState {
    pub service: LocalService,
    /// Largest accepted request body, uploads included.
    pub max_upload_bytes: usize,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .merge(health::routes())
        .merge(categories::routes())
        .merge(tags::routes())
        .merge(tasks::routes())
        .merge(attachments::routes())
        .merge(archive::routes())
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) type ApiError = (StatusCode, Json<Value>);

pub(crate) fn to_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidInput(_) | ServiceError::ArchiveFormat(_) => StatusCode::BAD_REQUEST,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Storage(_) | ServiceError::Derivation(_) | ServiceError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    }
    (status, Json(json!({ "error": e.to_string() })))
}
