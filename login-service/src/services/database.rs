//! Local credential store backed by PostgreSQL.
//!
//! Every operation acquires a pooled connection for exactly one statement and
//! releases it on all exit paths; connections are never held across upstream
//! network calls.

use crate::models::Credential;
use crate::services::error::ServiceError;
use crate::services::metrics::DB_QUERY_DURATION;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Local authority for credential records. The engine talks to this trait so
/// tests can substitute an in-memory store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Check the username/password pair against the store.
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, ServiceError>;

    /// Insert a new credential record. Duplicate usernames are rejected by
    /// the store's primary key, not by a pre-check here.
    async fn register(&self, credential: &Credential) -> Result<(), ServiceError>;

    /// Whether a record exists for this username.
    async fn exists(&self, username: &str) -> Result<bool, ServiceError>;

    /// Replace the stored password for an existing user.
    async fn update_password(&self, username: &str, new_password: &str)
        -> Result<(), ServiceError>;

    /// The stored email, if any. The local store is the system of record for
    /// email; the upstream provider only ever receives it during a sync push.
    async fn email_of(&self, username: &str) -> Result<Option<String>, ServiceError>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "login-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, ServiceError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), ServiceError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for Database {
    #[instrument(skip(self, password), fields(username = %username))]
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["authenticate"])
            .start_timer();

        let row = sqlx::query_scalar::<_, i32>(
            "SELECT 1 FROM login_users WHERE username = $1 AND password = $2",
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(row.is_some())
    }

    #[instrument(skip(self, credential), fields(username = %credential.username))]
    async fn register(&self, credential: &Credential) -> Result<(), ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["register"])
            .start_timer();

        sqlx::query("INSERT INTO login_users (username, password, email) VALUES ($1, $2, $3)")
            .bind(&credential.username)
            .bind(&credential.password)
            .bind(&credential.email)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    ServiceError::UserAlreadyExists
                }
                _ => ServiceError::Database(e),
            })?;

        timer.observe_duration();

        info!(username = %credential.username, "Credential record created");
        Ok(())
    }

    #[instrument(skip(self), fields(username = %username))]
    async fn exists(&self, username: &str) -> Result<bool, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["exists"])
            .start_timer();

        let row = sqlx::query_scalar::<_, i32>("SELECT 1 FROM login_users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();

        Ok(row.is_some())
    }

    #[instrument(skip(self, new_password), fields(username = %username))]
    async fn update_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_password"])
            .start_timer();

        let result = sqlx::query("UPDATE login_users SET password = $1 WHERE username = $2")
            .bind(new_password)
            .bind(username)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(ServiceError::UserNotFound);
        }

        info!(username = %username, "Password updated locally");
        Ok(())
    }

    #[instrument(skip(self), fields(username = %username))]
    async fn email_of(&self, username: &str) -> Result<Option<String>, ServiceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["email_of"])
            .start_timer();

        let email = sqlx::query_scalar::<_, Option<String>>(
            "SELECT email FROM login_users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();

        Ok(email.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL
    async fn test_create_pool() {
        let url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/login_test".to_string());

        let result = Database::new(&url, 5, 1).await;
        assert!(result.is_ok());
    }
}
