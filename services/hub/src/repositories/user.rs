//! User repository for database operations

use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{NewUser, User};

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user
    ///
    /// A duplicate username or email surfaces as a unique violation.
    pub async fn create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.username);

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(user)
    }

    /// Find a user by username
    pub async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.as_ref().map(map_user))
    }

}

fn map_user(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}
