use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;

use crate::app::AppState;
use crate::auth::Principal;
use crate::database::models::{NewTodoItem, TodoItem, TodoItemQuery};
use crate::middleware::{ApiResponse, ApiResult};

use super::actor;

/// GET /todoitems - list items, oldest first
pub async fn get(
    State(state): State<AppState>,
    query: Result<Query<TodoItemQuery>, QueryRejection>,
) -> ApiResult<Vec<TodoItem>> {
    let Query(query) = query?;
    let items = state.todo_service.list(query).await?;
    Ok(ApiResponse::success(items))
}

/// POST /todoitems - create an item owned by the caller
pub async fn post(
    State(state): State<AppState>,
    principal: Principal,
    body: Result<Json<NewTodoItem>, JsonRejection>,
) -> ApiResult<TodoItem> {
    let Json(new_item) = body?;
    let created = state.todo_service.create(new_item, actor(&principal)).await?;
    let location = format!("/todoitems/{}", created.id);
    Ok(ApiResponse::created(created, location))
}
