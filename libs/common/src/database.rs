//! Database module for handling SQLite connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the catalog datastore.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info};

/// Default datastore location when `DATABASE_URL` is not set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://resource_hub.db";

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub connection_timeout: u64,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: SQLite connection URL (default: `sqlite://resource_hub.db`)
    /// - `DATABASE_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    /// - `DATABASE_MIN_CONNECTIONS`: Minimum number of connections (default: 1)
    /// - `DATABASE_CONNECTION_TIMEOUT`: Acquire timeout in seconds (default: 30)
    pub fn from_env() -> DatabaseResult<Self> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let connection_timeout = env::var("DATABASE_CONNECTION_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        if min_connections > max_connections {
            return Err(DatabaseError::Configuration(format!(
                "DATABASE_MIN_CONNECTIONS ({}) exceeds DATABASE_MAX_CONNECTIONS ({})",
                min_connections, max_connections
            )));
        }

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            connection_timeout,
        })
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connection_timeout: 5,
        }
    }

    /// Whether the URL points at an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// Initialize a SQLite connection pool
///
/// An in-memory database lives only as long as its connection, so it is
/// pinned to exactly one connection that is never recycled.
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<SqlitePool>` - SQLite connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    info!("Initializing database connection pool");

    let acquire_timeout = Duration::from_secs(config.connection_timeout);
    let mut options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(acquire_timeout);

    let pool_options = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
    };

    let pool = pool_options
        .acquire_timeout(acquire_timeout)
        .connect_with(options)
        .await
        .map_err(DatabaseError::Connection)?;

    info!("Database connection pool initialized successfully");
    Ok(pool)
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - SQLite connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if the database answered, false otherwise
pub async fn health_check(pool: &SqlitePool) -> DatabaseResult<bool> {
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_database_config_from_env() {
        unsafe {
            std::env::remove_var("DATABASE_URL");
            std::env::remove_var("DATABASE_MAX_CONNECTIONS");
            std::env::remove_var("DATABASE_MIN_CONNECTIONS");
            std::env::remove_var("DATABASE_CONNECTION_TIMEOUT");
        }

        let config = DatabaseConfig::from_env().expect("Failed to create database config");
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connection_timeout, 30);
        assert!(!config.is_in_memory());
    }

    #[test]
    #[serial]
    fn test_database_config_rejects_inverted_bounds() {
        unsafe {
            std::env::set_var("DATABASE_MAX_CONNECTIONS", "2");
            std::env::set_var("DATABASE_MIN_CONNECTIONS", "4");
        }

        let result = DatabaseConfig::from_env();
        assert!(matches!(result, Err(DatabaseError::Configuration(_))));

        unsafe {
            std::env::remove_var("DATABASE_MAX_CONNECTIONS");
            std::env::remove_var("DATABASE_MIN_CONNECTIONS");
        }
    }

    #[tokio::test]
    async fn test_in_memory_pool_health() {
        let pool = init_pool(&DatabaseConfig::in_memory())
            .await
            .expect("in-memory pool");
        assert!(health_check(&pool).await.expect("health check"));
    }
}
