//! Shared fixtures for unit and router tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use uuid::Uuid;

use crate::auth::JwtAuthenticator;
use crate::config::{AppConfig, Environment};
use crate::database::models::{TodoItem, TodoItemChanges, TodoItemFilter};
use crate::database::{DatabaseError, TodoRepository};

pub const TEST_SECRET: &str = "todo-api-test-signing-secret";
pub const TEST_DOMAIN: &str = "todo.test.auth0.com";
pub const TEST_ISSUER: &str = "https://todo.test.auth0.com/";
pub const TEST_AUDIENCE: &str = "https://api.todo.test";
pub const TEST_SUBJECT: &str = "auth0|test-user";

/// Repository over a vector, mirroring the table's title constraint
#[derive(Default)]
pub struct InMemoryTodoRepository {
    items: Mutex<Vec<TodoItem>>,
    failing: bool,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails as if the database were unreachable
    pub fn failing() -> Self {
        Self {
            items: Mutex::default(),
            failing: true,
        }
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    fn check(&self) -> Result<(), DatabaseError> {
        if self.failing {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn check_title(title: &str) -> Result<(), DatabaseError> {
        if title.trim().is_empty() {
            return Err(DatabaseError::ConstraintViolation(
                "new row for relation \"todo_items\" violates check constraint \"todo_items_title_check\"".to_string(),
            ));
        }
        Ok(())
    }

    fn items(&self) -> std::sync::MutexGuard<'_, Vec<TodoItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn list(&self, filter: TodoItemFilter) -> Result<Vec<TodoItem>, DatabaseError> {
        self.check()?;
        let mut items: Vec<TodoItem> = self
            .items()
            .iter()
            .filter(|item| filter.is_complete.map_or(true, |done| item.is_complete == done))
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.created_on, a.id).cmp(&(b.created_on, b.id)));
        Ok(items
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TodoItem>, DatabaseError> {
        self.check()?;
        Ok(self.items().iter().find(|item| item.id == id).cloned())
    }

    async fn create(&self, item: TodoItem) -> Result<TodoItem, DatabaseError> {
        self.check()?;
        Self::check_title(&item.title)?;
        self.items().push(item.clone());
        Ok(item)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: &TodoItemChanges,
        updated_by: &str,
        updated_on: DateTime<Utc>,
    ) -> Result<Option<TodoItem>, DatabaseError> {
        self.check()?;
        Self::check_title(&changes.title)?;
        let mut items = self.items();
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            return Ok(None);
        };
        item.title = changes.title.clone();
        item.description = changes.description.clone();
        item.is_complete = changes.is_complete;
        item.due_on = changes.due_on;
        item.last_updated_by = Some(updated_by.to_string());
        item.last_updated_on = Some(updated_on);
        Ok(Some(item.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        self.check()?;
        let mut items = self.items();
        let before = items.len();
        items.retain(|item| item.id != id);
        Ok(items.len() < before)
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check()
    }
}

/// Development config pointed at the shared test secret
pub fn test_config(environment: Environment) -> AppConfig {
    let mut config = match environment {
        Environment::Development => AppConfig::development(),
        Environment::Staging => AppConfig::staging(),
        Environment::Production => AppConfig::production(),
    };
    config.database.url = "postgres://unused".to_string();
    config.auth.domain = TEST_DOMAIN.to_string();
    config.auth.audience = TEST_AUDIENCE.to_string();
    config.auth.signing_secret = Some(TEST_SECRET.to_string());
    config.security.require_https = false;
    config
}

pub fn test_app(config: &AppConfig, repository: Arc<dyn TodoRepository>) -> Router {
    let authenticator = JwtAuthenticator::from_config(&config.auth).expect("test authenticator");
    crate::app::build(config, repository, Arc::new(authenticator)).expect("test router")
}

pub fn mint_token(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("mint token")
}

/// A token for [`TEST_SUBJECT`] granting the given space separated scopes
pub fn token_with_scopes(scopes: &str) -> String {
    let now = Utc::now().timestamp();
    mint_token(&json!({
        "iss": TEST_ISSUER,
        "aud": TEST_AUDIENCE,
        "sub": TEST_SUBJECT,
        "scope": scopes,
        "iat": now,
        "exp": now + 600,
    }))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// One recorded tracing event
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub target: String,
    pub level: Level,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Subscriber layer collecting every event emitted while it is the default
#[derive(Clone, Default)]
pub struct CapturedEvents {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    pub fn all(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn with_target(&self, target: &str) -> Vec<CapturedEvent> {
        self.all().into_iter().filter(|e| e.target == target).collect()
    }
}

struct FieldRecorder<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldRecorder<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = HashMap::new();
        event.record(&mut FieldRecorder(&mut fields));
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(CapturedEvent {
                target: event.metadata().target().to_string(),
                level: *event.metadata().level(),
                fields,
            });
    }
}

/// Capture events on the current thread until the guard drops
pub fn capture_events() -> (CapturedEvents, tracing::subscriber::DefaultGuard) {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (events, guard)
}
