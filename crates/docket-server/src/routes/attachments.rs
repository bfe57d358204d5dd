use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use docket_service::TaskService;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;

use super::{to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/attachments/{id}", get(get_attachment))
        .route("/api/attachments/{id}/download", get(download_attachment))
}

async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_attachment(&id)
        .await
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}

/// Stored bytes for plain files; a zip of the page images for a PDF.
async fn download_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let download = state
        .service
        .download_attachment(&id)
        .await
        .map_err(to_error)?;
    let headers = file_headers(download.media_type(), download.file_name(), download.len());
    let body = Body::from_stream(ReaderStream::new(download.into_file()));
    Ok((headers, body))
}

/// Content headers for a streamed file body.
pub(crate) fn file_headers(
    media_type: &str,
    file_name: &str,
    len: u64,
) -> [(header::HeaderName, String); 3] {
    [
        (header::CONTENT_TYPE, media_type.to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(file_name)),
        (header::CONTENT_LENGTH, len.to_string()),
    ]
}

fn content_disposition(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_quotes_file_name() {
        assert_eq!(
            content_disposition("converted-report.pdf.zip"),
            "attachment; filename=\"converted-report.pdf.zip\""
        );
        assert_eq!(
            content_disposition("say \"hi\".txt"),
            "attachment; filename=\"say \\\"hi\\\".txt\""
        );
    }

    #[test]
    fn headers_carry_length_and_type() {
        let headers = file_headers("application/zip", "task.zip", 42);
        assert_eq!(headers[0].1, "application/zip");
        assert_eq!(headers[2].1, "42");
    }
}
