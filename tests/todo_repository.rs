//! Runs against a real PostgreSQL database; skipped unless DATABASE_URL is set.

use anyhow::Result;
use chrono::{Duration, Utc};
use todo_api_rust::config::DatabaseConfig;
use todo_api_rust::database::models::{TodoItem, TodoItemChanges, TodoItemQuery};
use todo_api_rust::database::{DatabaseError, DatabaseManager, PgTodoRepository, TodoRepository};
use uuid::Uuid;

async fn repository() -> Result<Option<PgTodoRepository>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let pool = DatabaseManager::connect(&DatabaseConfig {
        url,
        max_connections: 2,
        connection_timeout: 5,
        enable_query_logging: false,
    })
    .await?;
    DatabaseManager::ensure_schema(&pool).await?;
    Ok(Some(PgTodoRepository::new(pool)))
}

fn item(title: &str, created_by: &str) -> TodoItem {
    TodoItem {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        is_complete: false,
        due_on: Some(Utc::now() + Duration::days(1)),
        created_by: created_by.to_string(),
        created_on: Utc::now(),
        last_updated_by: None,
        last_updated_on: None,
    }
}

#[tokio::test]
async fn crud_lifecycle() -> Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };

    let created = repo.create(item("Integration item", "it-user")).await?;
    let fetched = repo.get(created.id).await?.expect("created row");
    assert_eq!(fetched.title, "Integration item");
    assert_eq!(fetched.created_by, "it-user");

    let changes = TodoItemChanges {
        title: "Integration item (done)".to_string(),
        description: Some("checked off".to_string()),
        is_complete: true,
        due_on: None,
    };
    let updated = repo
        .update(created.id, &changes, "it-updater", Utc::now())
        .await?
        .expect("updated row");
    assert_eq!(updated.id, created.id);
    assert!(updated.is_complete);
    assert_eq!(updated.due_on, None);
    assert_eq!(updated.last_updated_by.as_deref(), Some("it-updater"));

    let completed = repo
        .list(TodoItemQuery { is_complete: Some(true), limit: Some(1000), offset: None }.into_filter(1000))
        .await?;
    assert!(completed.iter().any(|i| i.id == created.id));

    assert!(repo.delete(created.id).await?);
    assert!(!repo.delete(created.id).await?);
    assert!(repo.get(created.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn missing_rows_are_not_errors() -> Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let changes = TodoItemChanges {
        title: "x".to_string(),
        description: None,
        is_complete: false,
        due_on: None,
    };
    let id = Uuid::new_v4();
    assert!(repo.get(id).await?.is_none());
    assert!(repo.update(id, &changes, "nobody", Utc::now()).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn blank_titles_violate_the_schema() -> Result<()> {
    let Some(repo) = repository().await? else {
        return Ok(());
    };
    let err = repo.create(item("  ", "it-user")).await.unwrap_err();
    assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    Ok(())
}
