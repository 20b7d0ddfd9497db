use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TodoItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_complete: bool,
    pub due_on: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub last_updated_by: Option<String>,
    pub last_updated_on: Option<DateTime<Utc>>,
}

/// Body of `POST /todoitems`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTodoItem {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

/// Body of `PUT /todoitems/:id`; replaces every mutable field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItemChanges {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_complete: bool,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

/// Query string of `GET /todoitems`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoItemQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub is_complete: Option<bool>,
}

/// A query after defaults and caps have been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TodoItemFilter {
    pub limit: i64,
    pub offset: i64,
    pub is_complete: Option<bool>,
}

pub const DEFAULT_PAGE_SIZE: i64 = 100;

impl TodoItemQuery {
    pub fn into_filter(self, max_page_size: i64) -> TodoItemFilter {
        let max_page_size = max_page_size.max(1);
        TodoItemFilter {
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, max_page_size),
            offset: self.offset.unwrap_or(0).max(0),
            is_complete: self.is_complete,
        }
    }
}
