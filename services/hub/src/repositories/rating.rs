//! Rating repository for database operations

use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::RatingEntry;

/// Rating repository
#[derive(Clone)]
pub struct RatingRepository {
    pool: SqlitePool,
}

impl RatingRepository {
    /// Create a new rating repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a rater's entry and fold the change into the
    /// resource's stored totals, all in one transaction
    ///
    /// Returns the new `(rating_sum, rating_count)`, or `None` when the
    /// resource does not exist.
    pub async fn upsert(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        score: i64,
        feedback: Option<&str>,
    ) -> DatabaseResult<Option<(i64, i64)>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        let exists = sqlx::query("SELECT 1 FROM resources WHERE id = ?")
            .bind(resource_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::Query)?
            .is_some();

        if !exists {
            tx.rollback().await.map_err(DatabaseError::Query)?;
            return Ok(None);
        }

        let prior: Option<i64> =
            sqlx::query_scalar("SELECT score FROM ratings WHERE resource_id = ? AND user_id = ?")
                .bind(resource_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(DatabaseError::Query)?;

        sqlx::query(
            r#"
            INSERT INTO ratings (resource_id, user_id, score, feedback, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (resource_id, user_id) DO UPDATE
            SET score = excluded.score,
                feedback = excluded.feedback,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(resource_id)
        .bind(user_id)
        .bind(score)
        .bind(feedback)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let (sum_delta, count_delta) = match prior {
            Some(old) => (score - old, 0),
            None => (score, 1),
        };

        let row = sqlx::query(
            r#"
            UPDATE resources
            SET rating_sum = rating_sum + ?, rating_count = rating_count + ?
            WHERE id = ?
            RETURNING rating_sum, rating_count
            "#,
        )
        .bind(sum_delta)
        .bind(count_delta)
        .bind(resource_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        let totals = (row.get("rating_sum"), row.get("rating_count"));

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(Some(totals))
    }

    /// A rater's current entry for a resource
    pub async fn find(&self, resource_id: Uuid, user_id: Uuid) -> DatabaseResult<Option<RatingEntry>> {
        let row = sqlx::query(
            r#"
            SELECT resource_id, user_id, score, feedback, created_at, updated_at
            FROM ratings
            WHERE resource_id = ? AND user_id = ?
            "#,
        )
        .bind(resource_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| RatingEntry {
            resource_id: row.get("resource_id"),
            user_id: row.get("user_id"),
            score: row.get("score"),
            feedback: row.get("feedback"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    /// `(sum, count)` recomputed from the entries themselves
    pub async fn entry_totals(&self, resource_id: Uuid) -> DatabaseResult<(i64, i64)> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(score), 0) AS total, COUNT(*) AS entries FROM ratings WHERE resource_id = ?",
        )
        .bind(resource_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        Ok((row.get("total"), row.get("entries")))
    }
}
