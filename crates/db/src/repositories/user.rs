use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crmlite_core::domain::timestamp::{format_timestamp, now_utc, parse_stored_timestamp};
use crmlite_core::domain::user::{User, UserId};

use super::{decode_error, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| decode_error("app_user.id", e))?;
    let username: String =
        row.try_get("username").map_err(|e| decode_error("app_user.username", e))?;
    let password_hash: String =
        row.try_get("password_hash").map_err(|e| decode_error("app_user.password_hash", e))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| decode_error("app_user.is_active", e))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| decode_error("app_user.created_at", e))?;
    let last_login_str: Option<String> =
        row.try_get("last_login_at").map_err(|e| decode_error("app_user.last_login_at", e))?;

    Ok(User {
        id: UserId(id),
        username,
        password_hash,
        is_active,
        created_at: parse_stored_timestamp(&created_at_str)
            .map_err(|e| decode_error("app_user.created_at", e))?,
        last_login_at: last_login_str
            .map(|raw| parse_stored_timestamp(&raw))
            .transpose()
            .map_err(|e| decode_error("app_user.last_login_at", e))?,
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, is_active, created_at, last_login_at
             FROM app_user WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let created_at = now_utc();

        let result = sqlx::query(
            "INSERT INTO app_user (username, password_hash, is_active, created_at)
             VALUES (?, ?, 1, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(format_timestamp(&created_at))
        .execute(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict { entity: "user", key: username.to_string() }
            }
            other => RepositoryError::Database(other),
        })?;

        Ok(User {
            id: UserId(result.last_insert_rowid()),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_active: true,
            created_at,
            last_login_at: None,
        })
    }

    async fn record_login(&self, user: &User, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE app_user SET last_login_at = ? WHERE id = ?")
            .bind(format_timestamp(&at))
            .bind(user.id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
