use sqlx::PgPool;
use tracing::{debug, info};

use crate::{
    auth::password::{hash_password, verify_password},
    db::models::User,
    error::ServiceError,
};

/// Postgres SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Credential store backed by the `users` table.
#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a user and returns its id. Only the Argon2 hash of `password`
    /// is persisted.
    pub async fn register(&self, username: &str, password: &str) -> Result<i64, ServiceError> {
        if username.trim().is_empty() {
            return Err(ServiceError::Validation("username must not be empty".into()));
        }
        if password.is_empty() {
            return Err(ServiceError::Validation("password must not be empty".into()));
        }

        if self.find_by_username(username).await?.is_some() {
            return Err(ServiceError::DuplicateUsername(username.to_owned()));
        }

        let hashed_password = {
            let password = password.to_owned();
            tokio::task::spawn_blocking(move || hash_password(&password))
                .await
                .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {e}")))??
        };

        let id = self.insert(username, &hashed_password).await?;

        info!(user_id = id, username = %username, "User registered");
        Ok(id)
    }

    /// Returns `true` iff `username` exists and `password` matches its stored
    /// hash.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, ServiceError> {
        let Some(user) = self.find_by_username(username).await? else {
            debug!(username = %username, "Credential check for unknown user");
            return Ok(false);
        };
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&password, &user.hashed_password))
            .await
            .map_err(|e| ServiceError::Internal(format!("password verification task failed: {e}")))
    }

    /// Inserts a user row. A unique violation on `username` (a concurrent
    /// registration of the same name) maps to `DuplicateUsername`.
    async fn insert(&self, username: &str, hashed_password: &str) -> Result<i64, ServiceError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, hashed_password) VALUES ($1, $2) RETURNING id",
        )
        .bind(username)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                ServiceError::DuplicateUsername(username.to_owned())
            }
            other => ServiceError::Database(other),
        })
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, hashed_password FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
