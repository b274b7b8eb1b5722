//! JWT service for token generation and validation
//!
//! Two kinds of tokens are signed with the same HS256 secret: access tokens
//! bound to a user, and short-lived download locators bound to a resource.
//! Validation is a pure function of the token, the secret and the clock.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use uuid::Uuid;

/// Shortest accepted signing secret, in bytes
const MIN_SECRET_LEN: usize = 32;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret for signing and verifying tokens
    pub secret: String,
    /// Access token expiration time in seconds (default: 24 hours)
    pub access_token_expiry: u64,
    /// Download locator expiration time in seconds (default: 5 minutes)
    pub download_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC signing secret (required)
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 86400)
    /// - `JWT_DOWNLOAD_TOKEN_EXPIRY`: Download locator expiry in seconds (default: 300)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        if secret.len() < MIN_SECRET_LEN {
            warn!(
                "JWT_SECRET is shorter than {} bytes; tokens are easier to forge",
                MIN_SECRET_LEN
            );
        }

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "86400".to_string()) // 24 hours
            .parse()
            .unwrap_or(86400);

        let download_token_expiry = std::env::var("JWT_DOWNLOAD_TOKEN_EXPIRY")
            .unwrap_or_else(|_| "300".to_string()) // 5 minutes
            .parse()
            .unwrap_or(300);

        Ok(JwtConfig {
            secret,
            access_token_expiry,
            download_token_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID for access tokens, resource ID for download locators
    pub sub: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type
    pub token_type: TokenType,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Download locator
    Download,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        if config.secret.is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String> {
        self.generate(user_id, TokenType::Access, self.config.access_token_expiry)
    }

    /// Generate a download locator for a resource
    pub fn generate_download_token(&self, resource_id: Uuid) -> Result<String> {
        self.generate(
            resource_id,
            TokenType::Download,
            self.config.download_token_expiry,
        )
    }

    fn generate(&self, sub: Uuid, token_type: TokenType, expiry: u64) -> Result<String> {
        let now = now_secs()?;
        self.sign(&Claims {
            sub,
            iat: now,
            exp: now.saturating_add(expiry),
            token_type,
        })
    }

    /// Sign arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token of the expected type and return the claims
    pub fn validate_token(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        if token_data.claims.token_type != expected {
            anyhow::bail!(
                "Expected a {:?} token, got {:?}",
                expected,
                token_data.claims.token_type
            );
        }

        Ok(token_data.claims)
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the download locator expiry time
    pub fn download_token_expiry(&self) -> u64 {
        self.config.download_token_expiry
    }
}

/// Seconds since the Unix epoch
pub fn now_secs() -> Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs();
    Ok(now)
}
