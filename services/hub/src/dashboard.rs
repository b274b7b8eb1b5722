//! Dashboard rankings derived from the catalog's aggregates

use common::cache::TtlCache;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{error::{ApiError, ApiResult}, models::Resource, repositories::ResourceRepository};

/// Both dashboard rankings, computed together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub top_rated: Vec<Resource>,
    pub most_downloaded: Vec<Resource>,
}

/// Computes top-rated and most-downloaded views on demand
///
/// Ties on the primary key are broken by rating count (higher first), then
/// by creation order (earlier first). The combined [`Dashboard`] is cached
/// for at most the configured TTL.
#[derive(Clone)]
pub struct DashboardRanker {
    resources: ResourceRepository,
    limit: u32,
    cache: TtlCache<Dashboard>,
}

impl DashboardRanker {
    pub fn new(resources: ResourceRepository, limit: u32, cache_ttl: Duration) -> Self {
        Self {
            resources,
            limit,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Highest average rating first
    pub async fn top_rated(&self, limit: u32) -> ApiResult<Vec<Resource>> {
        Ok(self.resources.top_rated(limit).await?)
    }

    /// Most downloads first
    pub async fn most_downloaded(&self, limit: u32) -> ApiResult<Vec<Resource>> {
        Ok(self.resources.most_downloaded(limit).await?)
    }

    /// Both rankings at the configured size, at most one cache TTL old
    pub async fn dashboard(&self) -> ApiResult<Dashboard> {
        self.cache
            .get_or_try_insert_with(|| async {
                debug!("Recomputing dashboard rankings");
                Ok::<_, ApiError>(Dashboard {
                    top_rated: self.top_rated(self.limit).await?,
                    most_downloaded: self.most_downloaded(self.limit).await?,
                })
            })
            .await
    }

    /// Maximum staleness of [`DashboardRanker::dashboard`]
    pub fn staleness_bound(&self) -> Duration {
        self.cache.ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestHub, metadata};
    use uuid::Uuid;

    async fn rate(hub: &TestHub, resource: Uuid, scores: &[i64]) {
        for score in scores {
            let rater = hub.user(&format!("rater_{}", &Uuid::new_v4().simple().to_string()[..12])).await;
            hub.state.ratings.submit(resource, rater, *score, None).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_top_rated_breaks_ties_by_rating_count() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;

        let few = hub.resource(owner, metadata("Few", "Law", "Semester 7")).await;
        let many = hub.resource(owner, metadata("Many", "Law", "Semester 7")).await;
        let low = hub.resource(owner, metadata("Low", "Law", "Semester 7")).await;

        rate(&hub, few, &[4, 5]).await;
        rate(&hub, many, &[4, 5, 4, 5]).await;
        rate(&hub, low, &[3, 3, 3, 3, 3]).await;

        let top = hub.state.dashboard.top_rated(2).await.unwrap();
        assert_eq!(top.iter().map(|r| r.id).collect::<Vec<_>>(), vec![many, few]);
        assert_eq!(top[0].average_rating, 4.5);
        assert_eq!(top[1].average_rating, 4.5);
    }

    #[tokio::test]
    async fn test_full_ties_fall_back_to_creation_order() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;

        let older = hub.resource(owner, metadata("Older", "Law", "Semester 7")).await;
        let newer = hub.resource(owner, metadata("Newer", "Law", "Semester 7")).await;

        let ranked = hub.state.dashboard.top_rated(10).await.unwrap();
        assert_eq!(ranked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![older, newer]);

        let ranked = hub.state.dashboard.most_downloaded(10).await.unwrap();
        assert_eq!(ranked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![older, newer]);
    }

    #[tokio::test]
    async fn test_most_downloaded_order() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;

        let once = hub.resource(owner, metadata("Once", "Law", "Semester 7")).await;
        let thrice = hub.resource(owner, metadata("Thrice", "Law", "Semester 7")).await;
        let never = hub.resource(owner, metadata("Never", "Law", "Semester 7")).await;

        hub.state.downloads.record_download(once).await.unwrap();
        for _ in 0..3 {
            hub.state.downloads.record_download(thrice).await.unwrap();
        }

        let ranked = hub.state.dashboard.most_downloaded(3).await.unwrap();
        assert_eq!(ranked.iter().map(|r| r.id).collect::<Vec<_>>(), vec![thrice, once, never]);
        assert_eq!(ranked[0].download_count, 3);

        let limited = hub.state.dashboard.most_downloaded(1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_dashboard_is_bounded_by_ttl() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;
        let resource = hub.resource(owner, metadata("Notes", "Law", "Semester 7")).await;

        let ranker = DashboardRanker::new(
            ResourceRepository::new(hub.state.db_pool.clone()),
            5,
            Duration::from_millis(200),
        );
        assert_eq!(ranker.staleness_bound(), Duration::from_millis(200));

        let before = ranker.dashboard().await.unwrap();
        assert_eq!(before.most_downloaded[0].download_count, 0);

        hub.state.downloads.record_download(resource).await.unwrap();
        let cached = ranker.dashboard().await.unwrap();
        assert_eq!(cached.most_downloaded[0].download_count, 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let fresh = ranker.dashboard().await.unwrap();
        assert_eq!(fresh.most_downloaded[0].download_count, 1);
    }
}
