use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::Principal;
use crate::database::models::{TodoItem, TodoItemChanges};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

use super::actor;

/// GET /todoitems/:id
pub async fn get(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<TodoItem> {
    let Path(id) = path?;
    match state.todo_service.get(id).await? {
        Some(item) => Ok(ApiResponse::success(item)),
        None => Err(not_found(id)),
    }
}

/// PUT /todoitems/:id - replace the mutable fields
pub async fn put(
    State(state): State<AppState>,
    principal: Principal,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TodoItemChanges>, JsonRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    let Json(changes) = body?;
    match state.todo_service.update(id, changes, actor(&principal)).await? {
        Some(_) => Ok(ApiResponse::no_content()),
        None => Err(not_found(id)),
    }
}

/// DELETE /todoitems/:id
pub async fn delete(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<()> {
    let Path(id) = path?;
    if state.todo_service.delete(id).await? {
        Ok(ApiResponse::no_content())
    } else {
        Err(not_found(id))
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::not_found(format!("Todo item {} not found", id))
}
