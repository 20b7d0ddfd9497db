use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{TodoItem, TodoItemChanges, TodoItemFilter};

/// Persistence contract for todo items.
///
/// `get`, `update` and `delete` report a missing row through `None`/`false`,
/// never through an error.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn list(&self, filter: TodoItemFilter) -> Result<Vec<TodoItem>, DatabaseError>;

    async fn get(&self, id: Uuid) -> Result<Option<TodoItem>, DatabaseError>;

    async fn create(&self, item: TodoItem) -> Result<TodoItem, DatabaseError>;

    async fn update(
        &self,
        id: Uuid,
        changes: &TodoItemChanges,
        updated_by: &str,
        updated_on: DateTime<Utc>,
    ) -> Result<Option<TodoItem>, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

const TODO_ITEM_COLUMNS: &str = "id, title, description, is_complete, due_on, \
     created_by, created_on, last_updated_by, last_updated_on";

/// PostgreSQL-backed repository; each write runs in its own transaction
#[derive(Clone)]
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TodoRepository for PgTodoRepository {
    async fn list(&self, filter: TodoItemFilter) -> Result<Vec<TodoItem>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM todo_items \
             WHERE ($1::BOOLEAN IS NULL OR is_complete = $1) \
             ORDER BY created_on, id \
             LIMIT $2 OFFSET $3",
            TODO_ITEM_COLUMNS
        );

        let items = sqlx::query_as::<_, TodoItem>(&sql)
            .bind(filter.is_complete)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn get(&self, id: Uuid) -> Result<Option<TodoItem>, DatabaseError> {
        let sql = format!("SELECT {} FROM todo_items WHERE id = $1", TODO_ITEM_COLUMNS);

        let item = sqlx::query_as::<_, TodoItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn create(&self, item: TodoItem) -> Result<TodoItem, DatabaseError> {
        let sql = format!(
            "INSERT INTO todo_items ({cols}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {cols}",
            cols = TODO_ITEM_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, TodoItem>(&sql)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.is_complete)
            .bind(item.due_on)
            .bind(&item.created_by)
            .bind(item.created_on)
            .bind(&item.last_updated_by)
            .bind(item.last_updated_on)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::classify)?;
        tx.commit().await?;

        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &TodoItemChanges,
        updated_by: &str,
        updated_on: DateTime<Utc>,
    ) -> Result<Option<TodoItem>, DatabaseError> {
        let sql = format!(
            "UPDATE todo_items \
             SET title = $2, description = $3, is_complete = $4, due_on = $5, \
                 last_updated_by = $6, last_updated_on = $7 \
             WHERE id = $1 \
             RETURNING {}",
            TODO_ITEM_COLUMNS
        );

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, TodoItem>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(changes.is_complete)
            .bind(changes.due_on)
            .bind(updated_by)
            .bind(updated_on)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::classify)?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM todo_items WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
