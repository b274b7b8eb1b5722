//! Rating models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's rating of one resource
#[derive(Debug, Clone, Serialize)]
pub struct RatingEntry {
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub score: i64,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Average and count of a resource's current ratings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub resource_id: Uuid,
    pub average: f64,
    pub count: i64,
}

impl RatingSummary {
    /// Build a summary from the stored score total and entry count
    pub fn from_totals(resource_id: Uuid, sum: i64, count: i64) -> Self {
        Self {
            resource_id,
            average: average(sum, count),
            count,
        }
    }
}

/// Mean of `count` scores adding up to `sum`; 0.0 when there are none
pub fn average(sum: i64, count: i64) -> f64 {
    if count <= 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Request for rating a resource
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: i64,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_does_not_divide_by_zero() {
        let summary = RatingSummary::from_totals(Uuid::new_v4(), 0, 0);
        assert_eq!(summary.average, 0.0);
        assert_eq!(summary.count, 0);
    }

    #[test]
    fn average_is_exact_mean() {
        assert_eq!(average(17, 5), 3.4);
        assert_eq!(average(9, 2), 4.5);
    }
}
