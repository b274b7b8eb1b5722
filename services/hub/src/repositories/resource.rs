//! Resource repository for database operations

use chrono::{DateTime, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};
use tracing::info;
use uuid::Uuid;

use crate::models::{BlobRef, Resource, Semester, rating::average, resource::normalize_tags};

/// Separator used when tags are concatenated by the database
const TAG_SEPARATOR: char = '\u{1f}';

const RESOURCE_SELECT: &str = r#"
    SELECT r.id, r.title, r.description, r.subject, r.semester, r.uploader_id,
           u.username AS uploader, r.blob_key, r.filename, r.content_type, r.size_bytes,
           r.rating_sum, r.rating_count, r.download_count, r.created_at,
           (SELECT group_concat(t.tag, char(31))
              FROM resource_tags t
             WHERE t.resource_id = r.id) AS tags
    FROM resources r
    JOIN users u ON u.id = r.uploader_id
"#;

/// Catalog metadata that has passed validation
#[derive(Debug, Clone)]
pub struct ValidatedResource {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub semester: Semester,
    pub tags: Vec<String>,
}

/// Parsed listing filter; every present option must match
#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery<'a> {
    pub subject: Option<&'a str>,
    pub semester: Option<Semester>,
    pub search: Option<&'a str>,
}

/// Resource repository for database operations
#[derive(Clone)]
pub struct ResourceRepository {
    pool: SqlitePool,
}

impl ResourceRepository {
    /// Create a new resource repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a resource and its tags in one transaction
    pub async fn create(
        &self,
        uploader_id: Uuid,
        metadata: &ValidatedResource,
        blob: &BlobRef,
    ) -> DatabaseResult<Uuid> {
        let id = Uuid::new_v4();
        let created_at: DateTime<Utc> = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;

        sqlx::query(
            r#"
            INSERT INTO resources (id, title, description, subject, semester, uploader_id,
                                   blob_key, filename, content_type, size_bytes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&metadata.title)
        .bind(&metadata.description)
        .bind(&metadata.subject)
        .bind(metadata.semester.to_string())
        .bind(uploader_id)
        .bind(&blob.key)
        .bind(&blob.filename)
        .bind(&blob.content_type)
        .bind(blob.size_bytes)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::Query)?;

        for tag in &metadata.tags {
            sqlx::query("INSERT OR IGNORE INTO resource_tags (resource_id, tag) VALUES (?, ?)")
                .bind(id)
                .bind(tag)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::Query)?;
        }

        tx.commit().await.map_err(DatabaseError::Query)?;

        info!("Stored resource {} ({})", id, metadata.title);
        Ok(id)
    }

    /// Get a resource by ID
    pub async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Resource>> {
        let mut qb = QueryBuilder::<Sqlite>::new(RESOURCE_SELECT);
        qb.push(" WHERE r.id = ").push_bind(id);

        let row = qb
            .build()
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.as_ref().map(map_resource).transpose()
    }

    /// List resources matching every present filter option, newest first
    pub async fn list(&self, query: ListQuery<'_>) -> DatabaseResult<Vec<Resource>> {
        let mut qb = QueryBuilder::<Sqlite>::new(RESOURCE_SELECT);
        qb.push(" WHERE 1 = 1");

        if let Some(subject) = query.subject {
            qb.push(" AND r.subject LIKE ")
                .push_bind(format!("{}%", escape_like(subject)))
                .push(" ESCAPE '\\'");
        }

        if let Some(semester) = query.semester {
            qb.push(" AND r.semester = ").push_bind(semester.to_string());
        }

        if let Some(search) = query.search {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (r.title LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR r.description LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR EXISTS (SELECT 1 FROM resource_tags st WHERE st.resource_id = r.id AND st.tag LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'))");
        }

        qb.push(" ORDER BY r.seq DESC");

        self.fetch_all(qb).await
    }

    /// Resources by average rating, then rating count, then age (oldest first)
    pub async fn top_rated(&self, limit: u32) -> DatabaseResult<Vec<Resource>> {
        let mut qb = QueryBuilder::<Sqlite>::new(RESOURCE_SELECT);
        qb.push(
            r#"
            ORDER BY CASE WHEN r.rating_count = 0 THEN 0.0
                          ELSE CAST(r.rating_sum AS REAL) / r.rating_count END DESC,
                     r.rating_count DESC,
                     r.seq ASC
            LIMIT "#,
        )
        .push_bind(i64::from(limit));

        self.fetch_all(qb).await
    }

    /// Resources by download count, then rating count, then age (oldest first)
    pub async fn most_downloaded(&self, limit: u32) -> DatabaseResult<Vec<Resource>> {
        let mut qb = QueryBuilder::<Sqlite>::new(RESOURCE_SELECT);
        qb.push(" ORDER BY r.download_count DESC, r.rating_count DESC, r.seq ASC LIMIT ")
            .push_bind(i64::from(limit));

        self.fetch_all(qb).await
    }

    /// Whether a resource with this ID exists
    pub async fn exists(&self, id: Uuid) -> DatabaseResult<bool> {
        let row = sqlx::query("SELECT 1 FROM resources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(row.is_some())
    }

    /// Add one download and return the new count, or `None` if the resource is unknown
    pub async fn increment_downloads(&self, id: Uuid) -> DatabaseResult<Option<i64>> {
        sqlx::query_scalar(
            r#"
            UPDATE resources
            SET download_count = download_count + 1
            WHERE id = ?
            RETURNING download_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }

    /// Stored `(rating_sum, rating_count)` of a resource
    pub async fn rating_totals(&self, id: Uuid) -> DatabaseResult<Option<(i64, i64)>> {
        let row = sqlx::query("SELECT rating_sum, rating_count FROM resources WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(row.map(|row| (row.get("rating_sum"), row.get("rating_count"))))
    }

    async fn fetch_all(&self, mut qb: QueryBuilder<'_, Sqlite>) -> DatabaseResult<Vec<Resource>> {
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        rows.iter().map(map_resource).collect()
    }
}

/// Escape `LIKE` wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn map_resource(row: &SqliteRow) -> DatabaseResult<Resource> {
    let semester: String = row.get("semester");
    let semester = semester
        .parse::<Semester>()
        .map_err(|e| DatabaseError::Query(sqlx::Error::Decode(e.into())))?;

    let tags: Option<String> = row.get("tags");
    let tags = normalize_tags(tags.as_deref().unwrap_or_default().split(TAG_SEPARATOR));

    let rating_sum: i64 = row.get("rating_sum");
    let rating_count: i64 = row.get("rating_count");

    Ok(Resource {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        subject: row.get("subject"),
        semester,
        tags,
        uploader_id: row.get("uploader_id"),
        uploader: row.get("uploader"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        created_at: row.get("created_at"),
        average_rating: average(rating_sum, rating_count),
        rating_count,
        download_count: row.get("download_count"),
        blob_key: row.get("blob_key"),
    })
}
