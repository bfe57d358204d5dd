use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use docket_core::tag::{CreateTag, UpdateTag};
use docket_service::TaskService;
use serde_json::{json, Value};

use super::{to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tags", get(list_tags).post(create_tag))
        .route(
            "/api/tags/{id}",
            get(get_tag).put(update_tag).delete(delete_tag),
        )
        .route("/api/tags/by-name/{name}", get(find_tag_by_name))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .service
        .list_tags()
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_tag(&id)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn find_tag_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .find_tag_by_name(&name)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn create_tag(
    State(state): State<AppState>,
    Json(input): Json<CreateTag>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .service
        .create_tag(&input)
        .await
        .map(|t| (StatusCode::CREATED, Json(json!(t))))
        .map_err(to_error)
}

async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateTag>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .update_tag(&id, &update)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_tag(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}
