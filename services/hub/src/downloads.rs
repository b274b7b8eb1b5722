//! Download counting and locator issuance
//!
//! A download is counted when its locator is issued, not when the bytes are
//! fetched: one `record_download` call is exactly one increment, whatever
//! happens to the locator afterwards.

use axum::body::Bytes;
use common::error::DatabaseError;
use common::retry::RetryPolicy;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    catalog::{ResourceCatalog, not_found},
    error::{ApiError, ApiResult},
    jwt::{JwtService, TokenType},
    locks::ResourceLocks,
    models::Resource,
    repositories::ResourceRepository,
};

/// Route prefix under which locators are redeemed
pub const FILES_PREFIX: &str = "/files";

/// Result of a counted download request
#[derive(Debug, Clone, Serialize)]
pub struct DownloadGrant {
    pub resource_id: Uuid,
    pub download_count: i64,
    #[serde(skip_serializing)]
    pub locator: String,
    pub download_url: String,
    /// Seconds until the locator stops working
    pub expires_in: u64,
}

/// Increments download counters and hands out short-lived locators
#[derive(Clone)]
pub struct DownloadTracker {
    resources: ResourceRepository,
    catalog: ResourceCatalog,
    jwt: JwtService,
    locks: ResourceLocks,
    retry: RetryPolicy,
}

impl DownloadTracker {
    pub fn new(
        resources: ResourceRepository,
        catalog: ResourceCatalog,
        jwt: JwtService,
        locks: ResourceLocks,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            resources,
            catalog,
            jwt,
            locks,
            retry,
        }
    }

    /// Count one download of a resource and issue a locator for its bytes
    pub async fn record_download(&self, resource_id: Uuid) -> ApiResult<DownloadGrant> {
        // Locks are only ever created for resources that exist
        if !self.resources.exists(resource_id).await? {
            return Err(not_found(resource_id));
        }

        let _guard = self.locks.acquire(resource_id).await?;

        let download_count = self
            .retry
            .run("download count", DatabaseError::is_retryable, || {
                self.resources.increment_downloads(resource_id)
            })
            .await?
            .ok_or_else(|| not_found(resource_id))?;

        let locator = self
            .jwt
            .generate_download_token(resource_id)
            .map_err(|e| ApiError::internal("Failed to generate download locator", e))?;

        info!(
            "Issued download locator for resource {} (download #{})",
            resource_id, download_count
        );

        Ok(DownloadGrant {
            resource_id,
            download_count,
            download_url: format!("{}/{}", FILES_PREFIX, locator),
            locator,
            expires_in: self.jwt.download_token_expiry(),
        })
    }

    /// Exchange a locator for the resource and its bytes
    ///
    /// Does not touch the download counter.
    pub async fn redeem(&self, locator: &str) -> ApiResult<(Resource, Bytes)> {
        let claims = self
            .jwt
            .validate_token(locator, TokenType::Download)
            .map_err(|e| {
                warn!("Rejected download locator: {}", e);
                ApiError::Unauthorized
            })?;

        let resource = self.catalog.get(claims.sub).await?;
        let bytes = self.catalog.read_blob(&resource).await?;
        Ok((resource, bytes))
    }

    /// Current download count of a resource
    pub async fn count_for(&self, resource_id: Uuid) -> ApiResult<i64> {
        Ok(self.catalog.get(resource_id).await?.download_count)
    }
}
