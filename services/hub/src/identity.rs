//! Identity store: registration, credential checks and token issuance

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use std::sync::OnceLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    jwt::{JwtService, TokenType},
    models::{NewUser, TokenResponse},
    repositories::UserRepository,
    validation,
};

/// Users, their password hashes, and the tokens issued to them
#[derive(Clone)]
pub struct IdentityStore {
    users: UserRepository,
    jwt: JwtService,
}

impl IdentityStore {
    pub fn new(users: UserRepository, jwt: JwtService) -> Self {
        Self { users, jwt }
    }

    /// Register a new user and return its ID
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ApiResult<Uuid> {
        let username = username.trim();
        let email = email.trim();

        validation::validate_username(username).map_err(ApiError::InvalidArgument)?;
        validation::validate_email(email).map_err(ApiError::InvalidArgument)?;
        validation::validate_password(password).map_err(ApiError::InvalidArgument)?;

        let password_hash = hash_password(password.to_string()).await?;

        let new_user = NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
        };

        match self.users.create(&new_user).await {
            Ok(user) => {
                info!("Registered user {} ({})", user.username, user.id);
                Ok(user.id)
            }
            Err(e) if e.is_unique_violation() => {
                let message = if e.database_message().is_some_and(|m| m.contains("email")) {
                    "Email already registered"
                } else {
                    "Username already exists"
                };
                Err(ApiError::Conflict(message.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check credentials and issue an access token
    ///
    /// Unknown usernames and wrong passwords are indistinguishable to the
    /// caller, and both pay for a full hash verification.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<TokenResponse> {
        let user = self.users.find_by_username(username.trim()).await?;

        let (user_id, stored_hash) = match user {
            Some(user) => (Some(user.id), Some(user.password_hash)),
            None => (None, dummy_hash().map(str::to_string)),
        };

        let verified = match stored_hash {
            Some(hash) => verify_password(password.to_string(), hash).await?,
            None => false,
        };

        let user_id = match (verified, user_id) {
            (true, Some(id)) => id,
            _ => {
                warn!("Rejected login attempt");
                return Err(ApiError::Unauthorized);
            }
        };

        let access_token = self
            .jwt
            .generate_access_token(user_id)
            .map_err(|e| ApiError::internal("Failed to generate access token", e))?;

        info!("Issued access token for user {}", user_id);

        Ok(TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.jwt.access_token_expiry(),
        })
    }

    /// Resolve a bearer token to the user it was issued to
    pub fn verify(&self, token: &str) -> ApiResult<Uuid> {
        self.jwt
            .validate_token(token, TokenType::Access)
            .map(|claims| claims.sub)
            .map_err(|_| ApiError::Unauthorized)
    }
}

/// Hash a password with a fresh salt on the blocking pool
async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut rand::thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| ApiError::internal("Password hashing task failed", e))?
    .map_err(|e| ApiError::internal("Failed to hash password", e))
}

/// Verify a password against a stored PHC hash on the blocking pool
async fn verify_password(password: String, stored_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| ApiError::internal("Password verification task failed", e))?
    .map_err(|e| ApiError::internal("Failed to verify password", e))
}

/// Hash of a random secret, verified against when the username is unknown
fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| {
            let salt = SaltString::generate(&mut rand::thread_rng());
            Argon2::default()
                .hash_password(Uuid::new_v4().as_bytes(), &salt)
                .ok()
                .map(|hash| hash.to_string())
        })
        .as_deref()
}
