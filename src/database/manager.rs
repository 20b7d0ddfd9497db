use std::str::FromStr;
use std::time::Duration;

use sqlx::error::ErrorKind;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Schema constraint failures are caller mistakes, everything else is a fault
    pub fn classify(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(db_err.kind(), ErrorKind::CheckViolation | ErrorKind::NotNullViolation) {
                return DatabaseError::ConstraintViolation(db_err.message().to_string());
            }
        }
        DatabaseError::Sqlx(err)
    }
}

const CREATE_TODO_ITEMS: &str = r#"
    CREATE TABLE IF NOT EXISTS todo_items (
        id              UUID PRIMARY KEY,
        title           TEXT NOT NULL CHECK (length(btrim(title)) > 0),
        description     TEXT,
        is_complete     BOOLEAN NOT NULL DEFAULT FALSE,
        due_on          TIMESTAMPTZ,
        created_by      TEXT NOT NULL,
        created_on      TIMESTAMPTZ NOT NULL,
        last_updated_by TEXT,
        last_updated_on TIMESTAMPTZ
    )
"#;

const CREATE_TODO_ITEMS_ORDER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS todo_items_created_on_idx ON todo_items (created_on, id)";

/// Owns pool construction and schema bootstrap for the todo database
pub struct DatabaseManager;

impl DatabaseManager {
    /// Connect the shared pool. Statement logging stays on unless the config disables it.
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let mut options =
            PgConnectOptions::from_str(&config.url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !config.enable_query_logging {
            options = options.disable_statement_logging();
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(options)
            .await?;

        info!(
            "Created database pool (max {} connections, query logging {})",
            config.max_connections, config.enable_query_logging
        );
        Ok(pool)
    }

    /// Idempotent; run once at startup
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query(CREATE_TODO_ITEMS).execute(pool).await?;
        sqlx::query(CREATE_TODO_ITEMS_ORDER_INDEX).execute(pool).await?;
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_urls() {
        let config = DatabaseConfig {
            url: "not a url".to_string(),
            max_connections: 1,
            connection_timeout: 1,
            enable_query_logging: false,
        };
        let err = DatabaseManager::connect(&config).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidDatabaseUrl));
    }

    #[test]
    fn non_database_errors_stay_faults() {
        let err = DatabaseError::classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::Sqlx(sqlx::Error::RowNotFound)));
    }
}
