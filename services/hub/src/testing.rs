//! Shared fixtures for unit tests

use axum::body::Bytes;
use common::database::DatabaseConfig;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

use crate::{
    build_state,
    config::ServerConfig,
    jwt::{JwtConfig, JwtService},
    models::NewResource,
    state::AppState,
};

pub const FILE_BYTES: &[u8] = b"%PDF-1.4 lecture notes";

const SECRET: &str = "test-secret-with-at-least-32-bytes!!";

pub fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: SECRET.to_string(),
        access_token_expiry: 3600,
        download_token_expiry: 300,
    }
}

pub fn jwt_service() -> JwtService {
    JwtService::new(jwt_config()).unwrap()
}

pub fn metadata(title: &str, subject: &str, semester: &str) -> NewResource {
    NewResource {
        title: title.to_string(),
        description: format!("Study material for {}", subject),
        subject: subject.to_string(),
        semester: semester.to_string(),
        tags: Vec::new(),
    }
}

/// A fully wired hub over a private in-memory database
pub struct TestHub {
    pub state: AppState,
    /// Signs tokens with the same secret as the hub
    pub jwt: JwtService,
    _dir: TempDir,
}

impl TestHub {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let server = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            upload_dir: dir.path().join("uploads"),
            max_upload_bytes: 1024 * 1024,
            dashboard_limit: 5,
            dashboard_cache_ttl_secs: 0,
            lock_timeout_ms: 10_000,
            max_retries: 3,
            retry_backoff_ms: 1,
            request_timeout_secs: 30,
            cors_origins: "http://localhost:3000".to_string(),
        };

        let state = build_state(server, &DatabaseConfig::in_memory(), jwt_config())
            .await
            .unwrap();

        Self {
            state,
            jwt: jwt_service(),
            _dir: dir,
        }
    }

    /// Register a user and return its ID
    pub async fn user(&self, name: &str) -> Uuid {
        self.state
            .identity
            .register(name, &format!("{}@example.com", name), "password123")
            .await
            .unwrap()
    }

    /// Upload a small file with the given metadata and return its ID
    pub async fn resource(&self, uploader: Uuid, metadata: NewResource) -> Uuid {
        self.state
            .catalog
            .upload(
                uploader,
                &metadata,
                "notes.pdf",
                Some("application/pdf".to_string()),
                Bytes::from_static(FILE_BYTES),
            )
            .await
            .unwrap()
    }

    pub fn upload_dir(&self) -> &Path {
        &self.state.config.upload_dir
    }
}
