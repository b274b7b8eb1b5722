//! Rating aggregation
//!
//! Each `(resource, rater)` pair holds at most one entry. The resource's
//! `(sum, count)` totals are updated in the same transaction as the entry,
//! under that resource's lock, so the average always equals the mean of the
//! current entries.

use common::error::DatabaseError;
use common::retry::RetryPolicy;
use tracing::info;
use uuid::Uuid;

use crate::{
    catalog::not_found,
    error::{ApiError, ApiResult},
    locks::ResourceLocks,
    models::{RatingEntry, RatingSummary},
    repositories::{RatingRepository, ResourceRepository},
    validation,
};

/// Maintains per-resource rating statistics
#[derive(Clone)]
pub struct RatingAggregator {
    ratings: RatingRepository,
    resources: ResourceRepository,
    locks: ResourceLocks,
    retry: RetryPolicy,
}

impl RatingAggregator {
    pub fn new(
        ratings: RatingRepository,
        resources: ResourceRepository,
        locks: ResourceLocks,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ratings,
            resources,
            locks,
            retry,
        }
    }

    /// Record or replace a rater's score and return the new summary
    pub async fn submit(
        &self,
        resource_id: Uuid,
        rater_id: Uuid,
        score: i64,
        feedback: Option<&str>,
    ) -> ApiResult<RatingSummary> {
        validation::validate_score(score).map_err(ApiError::InvalidArgument)?;

        let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());
        if let Some(feedback) = feedback {
            validation::validate_text("Feedback", feedback).map_err(ApiError::InvalidArgument)?;
        }

        if !self.resources.exists(resource_id).await? {
            return Err(not_found(resource_id));
        }

        let _guard = self.locks.acquire(resource_id).await?;

        let totals = self
            .retry
            .run("rating submission", DatabaseError::is_retryable, || {
                self.ratings.upsert(resource_id, rater_id, score, feedback)
            })
            .await?;

        let (sum, count) = totals.ok_or_else(|| not_found(resource_id))?;
        let summary = RatingSummary::from_totals(resource_id, sum, count);

        info!(
            "User {} rated resource {} with {}; average now {:.2} over {}",
            rater_id, resource_id, score, summary.average, summary.count
        );

        Ok(summary)
    }

    /// Current summary of a resource's ratings
    pub async fn summary_for(&self, resource_id: Uuid) -> ApiResult<RatingSummary> {
        let (sum, count) = self
            .resources
            .rating_totals(resource_id)
            .await?
            .ok_or_else(|| not_found(resource_id))?;

        Ok(RatingSummary::from_totals(resource_id, sum, count))
    }

    /// A rater's current entry for a resource, if any
    pub async fn entry(&self, resource_id: Uuid, rater_id: Uuid) -> ApiResult<Option<RatingEntry>> {
        Ok(self.ratings.find(resource_id, rater_id).await?)
    }

    /// Summary recomputed from the stored entries rather than the running totals
    pub async fn recompute(&self, resource_id: Uuid) -> ApiResult<RatingSummary> {
        let (sum, count) = self.ratings.entry_totals(resource_id).await?;
        Ok(RatingSummary::from_totals(resource_id, sum, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestHub, metadata};

    #[tokio::test]
    async fn test_fifth_rating_moves_average() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;
        let resource = hub.resource(owner, metadata("Notes", "Biology", "Semester 2")).await;

        for (name, score) in [("rater1", 1), ("rater2", 2), ("rater3", 4), ("rater4", 5)] {
            let rater = hub.user(name).await;
            hub.state.ratings.submit(resource, rater, score, None).await.unwrap();
        }
        assert_eq!(hub.state.ratings.summary_for(resource).await.unwrap().average, 3.0);

        let fifth = hub.user("rater5").await;
        let summary = hub.state.ratings.submit(resource, fifth, 5, None).await.unwrap();

        assert_eq!(summary.average, 3.4);
        assert_eq!(summary.count, 5);
        assert_eq!(hub.state.ratings.recompute(resource).await.unwrap(), summary);
    }

    #[tokio::test]
    async fn test_resubmission_replaces_prior_entry() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;
        let rater = hub.user("rater").await;
        let other = hub.user("other").await;
        let resource = hub.resource(owner, metadata("Notes", "Biology", "Semester 2")).await;

        hub.state.ratings.submit(resource, other, 4, None).await.unwrap();
        hub.state.ratings.submit(resource, rater, 2, Some("meh")).await.unwrap();
        let summary = hub
            .state
            .ratings
            .submit(resource, rater, 5, Some("  much better  "))
            .await
            .unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, 4.5);

        let entry = hub.state.ratings.entry(resource, rater).await.unwrap().unwrap();
        assert_eq!(entry.score, 5);
        assert_eq!(entry.feedback.as_deref(), Some("much better"));
        assert_eq!(hub.state.ratings.recompute(resource).await.unwrap(), summary);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_rejected() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;
        let resource = hub.resource(owner, metadata("Notes", "Biology", "Semester 2")).await;

        for score in [0, 6, -1] {
            let err = hub.state.ratings.submit(resource, owner, score, None).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)));
        }

        let summary = hub.state.ratings.summary_for(resource).await.unwrap();
        assert_eq!((summary.average, summary.count), (0.0, 0));
    }

    #[tokio::test]
    async fn test_unknown_resource_is_not_found() {
        let hub = TestHub::new().await;
        let rater = hub.user("rater").await;

        for _ in 0..20 {
            let err = hub.state.ratings.submit(Uuid::new_v4(), rater, 3, None).await.unwrap_err();
            assert!(matches!(err, ApiError::NotFound(_)));
        }
        assert!(hub.state.ratings.locks.is_empty());

        let err = hub.state.ratings.summary_for(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_keep_totals_consistent() {
        let hub = TestHub::new().await;
        let owner = hub.user("owner").await;
        let resource = hub.resource(owner, metadata("Notes", "Biology", "Semester 2")).await;

        let mut raters = Vec::new();
        for i in 0..8 {
            raters.push(hub.user(&format!("rater_{}", i)).await);
        }

        let mut handles = Vec::new();
        for (i, rater) in raters.iter().copied().enumerate() {
            let ratings = hub.state.ratings.clone();
            handles.push(tokio::spawn(async move {
                let first = (i % 5) as i64 + 1;
                ratings.submit(resource, rater, first, None).await?;
                ratings.submit(resource, rater, 6 - first, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = hub.state.ratings.summary_for(resource).await.unwrap();
        assert_eq!(summary.count, 8);
        assert_eq!(summary, hub.state.ratings.recompute(resource).await.unwrap());
    }
}
