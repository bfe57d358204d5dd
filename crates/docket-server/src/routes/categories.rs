use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use docket_core::category::{CreateCategory, UpdateCategory};
use docket_service::TaskService;
use serde_json::{json, Value};

use super::{to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/api/categories/by-name/{name}", get(find_category_by_name))
}

async fn list_categories(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .service
        .list_categories()
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_category(&id)
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn find_category_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .find_category_by_name(&name)
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategory>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .service
        .create_category(&input)
        .await
        .map(|c| (StatusCode::CREATED, Json(json!(c))))
        .map_err(to_error)
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateCategory>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .update_category(&id, &update)
        .await
        .map(|c| Json(json!(c)))
        .map_err(to_error)
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_category(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}
