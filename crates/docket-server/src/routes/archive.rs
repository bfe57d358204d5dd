use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use docket_core::media;
use docket_service::TaskService;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use super::attachments::file_headers;
use super::form::{read_archive, ARCHIVE_FIELD};
use super::{to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks/{id}/export", get(export_task))
        .route("/api/tasks/import", post(import_task))
}

async fn export_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let archive = state.service.export_task(&id).await.map_err(to_error)?;
    let headers = file_headers(media::ZIP, &archive.file_name, archive.len);
    Ok((headers, Body::from_stream(ReaderStream::new(archive.file))))
}

async fn import_task(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let archive = read_archive(multipart, ARCHIVE_FIELD).await?;
    state
        .service
        .import_archive(archive)
        .await
        .map(|t| (StatusCode::CREATED, Json(json!(t))))
        .map_err(to_error)
}
