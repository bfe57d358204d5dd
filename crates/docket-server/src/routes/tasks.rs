use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use docket_core::task::{CreateTask, TaskFilter, TaskSort, UpdateTask};
use docket_service::{ServiceError, TaskService};
use serde::Deserialize;
use serde_json::{json, Value};

use super::form::TaskForm;
use super::{to_error, ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/search", get(search_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/attachments", get(list_attachments))
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    sort: Option<String>,
    category_id: Option<String>,
    tag_id: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    title: String,
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<Value>, ApiError> {
    let sort = match q.sort.as_deref() {
        None => TaskSort::default(),
        Some(s) => TaskSort::parse_str(s).ok_or_else(|| {
            to_error(ServiceError::InvalidInput(format!("unknown sort order {s}")))
        })?,
    };
    let filter = TaskFilter {
        title: None,
        category_id: q.category_id,
        tag_id: q.tag_id,
        sort,
        limit: q.limit,
    };
    state
        .service
        .list_tasks(&filter)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn search_tasks(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .search_tasks(&q.title)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .get_task(&id)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn create_task(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form = TaskForm::read(multipart).await?;
    let input = CreateTask {
        title: form.text("title").unwrap_or_default(),
        description: form.text("description").unwrap_or_default(),
        category_id: form.reference("category_id").flatten(),
        tag_id: form.reference("tag_id").flatten(),
    };
    state
        .service
        .create_task(&input, form.uploads)
        .await
        .map(|saved| (StatusCode::CREATED, Json(json!(saved))))
        .map_err(to_error)
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = TaskForm::read(multipart).await?;
    let update = UpdateTask {
        title: form.text("title"),
        description: form.text("description"),
        category_id: form.reference("category_id"),
        tag_id: form.reference("tag_id"),
    };
    state
        .service
        .update_task(&id, &update, form.uploads)
        .await
        .map(|saved| Json(json!(saved)))
        .map_err(to_error)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete_task(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn list_attachments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .list_attachments(&id)
        .await
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}
