//! Application state shared across handlers

use sqlx::SqlitePool;

use crate::{
    catalog::ResourceCatalog, config::ServerConfig, dashboard::DashboardRanker,
    downloads::DownloadTracker, identity::IdentityStore, ratings::RatingAggregator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub identity: IdentityStore,
    pub catalog: ResourceCatalog,
    pub ratings: RatingAggregator,
    pub downloads: DownloadTracker,
    pub dashboard: DashboardRanker,
    pub config: ServerConfig,
}
