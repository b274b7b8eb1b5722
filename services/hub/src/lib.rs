//! Resource hub: a catalog of shared study resources
//!
//! Registered users upload files with descriptive metadata, browse and
//! search the catalog, download files and rate them. The dashboard ranks
//! resources by average rating and by download count.

pub mod blob;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod downloads;
pub mod error;
pub mod identity;
pub mod jwt;
pub mod locks;
pub mod middleware;
pub mod models;
pub mod ratings;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod validation;

#[cfg(test)]
mod testing;

use anyhow::Result;
use axum::Router;
use common::database::{DatabaseConfig, init_pool};
use common::error::DatabaseError;
use std::sync::Arc;
use tracing::info;

use crate::{
    blob::LocalBlobStore,
    catalog::ResourceCatalog,
    config::ServerConfig,
    dashboard::DashboardRanker,
    downloads::DownloadTracker,
    identity::IdentityStore,
    jwt::{JwtConfig, JwtService},
    locks::ResourceLocks,
    ratings::RatingAggregator,
    repositories::{RatingRepository, ResourceRepository, UserRepository},
    state::AppState,
};

/// Connect to the datastore, apply migrations and wire every component
pub async fn build_state(
    server: ServerConfig,
    database: &DatabaseConfig,
    jwt: JwtConfig,
) -> Result<AppState> {
    let pool = init_pool(database).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    info!("Database migrations applied");

    let jwt_service = JwtService::new(jwt)?;
    let blobs = LocalBlobStore::open(&server.upload_dir).await?;

    let users = UserRepository::new(pool.clone());
    let resources = ResourceRepository::new(pool.clone());
    let ratings = RatingRepository::new(pool.clone());
    let locks = ResourceLocks::new(server.lock_timeout());
    let retry = server.retry_policy();

    let catalog = ResourceCatalog::new(resources.clone(), Arc::new(blobs));

    Ok(AppState {
        db_pool: pool,
        identity: IdentityStore::new(users, jwt_service.clone()),
        ratings: RatingAggregator::new(ratings, resources.clone(), locks.clone(), retry),
        downloads: DownloadTracker::new(
            resources.clone(),
            catalog.clone(),
            jwt_service,
            locks,
            retry,
        ),
        dashboard: DashboardRanker::new(
            resources,
            server.dashboard_limit,
            server.dashboard_cache_ttl(),
        ),
        catalog,
        config: server,
    })
}

/// The HTTP application for a wired state
pub fn app(state: AppState) -> Router {
    routes::create_router(state)
}
