use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::models::{NewTodoItem, TodoItem, TodoItemChanges, TodoItemQuery};
use crate::database::{DatabaseError, TodoRepository};

/// Application facade over the todo repository.
///
/// Stateless apart from the shared repository handle, so it is cloned into
/// every request rather than constructed per request.
#[derive(Clone)]
pub struct TodoService {
    repository: Arc<dyn TodoRepository>,
    max_page_size: i64,
}

impl TodoService {
    pub fn new(repository: Arc<dyn TodoRepository>, max_page_size: i64) -> Self {
        Self {
            repository,
            max_page_size,
        }
    }

    pub async fn list(&self, query: TodoItemQuery) -> Result<Vec<TodoItem>, DatabaseError> {
        let filter = query.into_filter(self.max_page_size);
        debug!(?filter, "Listing todo items");
        self.repository.list(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<TodoItem>, DatabaseError> {
        self.repository.get(id).await
    }

    /// Assigns the id and creation stamp, then persists
    pub async fn create(&self, new_item: NewTodoItem, created_by: &str) -> Result<TodoItem, DatabaseError> {
        let item = TodoItem {
            id: Uuid::new_v4(),
            title: new_item.title,
            description: new_item.description,
            is_complete: new_item.is_complete,
            due_on: new_item.due_on,
            created_by: created_by.to_string(),
            created_on: Utc::now(),
            last_updated_by: None,
            last_updated_on: None,
        };

        let created = self.repository.create(item).await?;
        info!(id = %created.id, created_by, "Created todo item");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: Uuid,
        changes: TodoItemChanges,
        updated_by: &str,
    ) -> Result<Option<TodoItem>, DatabaseError> {
        let updated = self
            .repository
            .update(id, &changes, updated_by, Utc::now())
            .await?;
        if updated.is_some() {
            info!(%id, updated_by, "Updated todo item");
        }
        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            info!(%id, "Deleted todo item");
        }
        Ok(deleted)
    }

    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        self.repository.ping().await
    }
}
