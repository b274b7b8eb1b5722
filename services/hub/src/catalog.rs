//! Resource catalog: creation, filtered listing and lookup

use axum::body::Bytes;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    blob::{BlobStore, new_blob_key},
    error::{ApiError, ApiResult},
    models::{BlobRef, NewResource, Resource, ResourceFilter, Semester, resource::normalize_tags},
    repositories::{ListQuery, ResourceRepository, ValidatedResource},
    validation,
};

/// Authoritative store of resource metadata and the bytes behind it
#[derive(Clone)]
pub struct ResourceCatalog {
    resources: ResourceRepository,
    blobs: Arc<dyn BlobStore>,
}

impl ResourceCatalog {
    pub fn new(resources: ResourceRepository, blobs: Arc<dyn BlobStore>) -> Self {
        Self { resources, blobs }
    }

    /// Catalog a resource whose bytes are already stored under `blob`
    pub async fn create(
        &self,
        uploader_id: Uuid,
        metadata: &NewResource,
        blob: &BlobRef,
    ) -> ApiResult<Uuid> {
        let metadata = validate_metadata(metadata)?;
        Ok(self.resources.create(uploader_id, &metadata, blob).await?)
    }

    /// Store uploaded bytes and catalog them
    ///
    /// Metadata is validated before any bytes are written, and the blob is
    /// removed again if cataloguing fails, so a failed upload leaves nothing
    /// behind.
    pub async fn upload(
        &self,
        uploader_id: Uuid,
        metadata: &NewResource,
        filename: &str,
        content_type: Option<String>,
        bytes: Bytes,
    ) -> ApiResult<Uuid> {
        validate_metadata(metadata)?;

        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ApiError::InvalidArgument("File name is required".to_string()));
        }

        let blob = BlobRef {
            key: new_blob_key(filename),
            filename: filename.to_string(),
            content_type,
            size_bytes: i64::try_from(bytes.len())
                .map_err(|_| ApiError::InvalidArgument("File is too large".to_string()))?,
        };

        self.blobs
            .put(&blob.key, bytes)
            .await
            .map_err(|e| ApiError::internal("Failed to store uploaded file", e))?;

        match self.create(uploader_id, metadata, &blob).await {
            Ok(id) => {
                info!(
                    "User {} uploaded resource {} ({} bytes)",
                    uploader_id, id, blob.size_bytes
                );
                Ok(id)
            }
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&blob.key).await {
                    warn!("Failed to remove orphaned blob {}: {}", blob.key, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Resources matching every present filter option, newest first
    pub async fn list(&self, filter: &ResourceFilter) -> ApiResult<Vec<Resource>> {
        let query = ListQuery {
            subject: filter.subject(),
            semester: filter.semester().map_err(ApiError::InvalidArgument)?,
            search: filter.search(),
        };

        Ok(self.resources.list(query).await?)
    }

    /// Look up one resource
    pub async fn get(&self, id: Uuid) -> ApiResult<Resource> {
        self.resources
            .find_by_id(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    /// Read the stored bytes of a resource
    pub async fn read_blob(&self, resource: &Resource) -> ApiResult<Bytes> {
        self.blobs
            .get(&resource.blob_key)
            .await
            .map_err(|e| ApiError::internal("Failed to read stored file", e))?
            .ok_or_else(|| {
                warn!("Blob {} for resource {} is missing", resource.blob_key, resource.id);
                ApiError::NotFound(format!("File for resource {} not found", resource.id))
            })
    }
}

pub(crate) fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Resource {} not found", id))
}

/// Check required fields, parse the semester and normalise tags
pub fn validate_metadata(metadata: &NewResource) -> ApiResult<ValidatedResource> {
    validation::validate_required("Title", &metadata.title).map_err(ApiError::InvalidArgument)?;
    validation::validate_required("Subject", &metadata.subject)
        .map_err(ApiError::InvalidArgument)?;

    if metadata.description.trim().is_empty() {
        return Err(ApiError::InvalidArgument("Description is required".to_string()));
    }
    validation::validate_text("Description", &metadata.description)
        .map_err(ApiError::InvalidArgument)?;

    let semester: Semester = metadata
        .semester
        .parse()
        .map_err(ApiError::InvalidArgument)?;

    let tags = normalize_tags(&metadata.tags);
    for tag in &tags {
        validation::validate_tag(tag).map_err(ApiError::InvalidArgument)?;
    }

    Ok(ValidatedResource {
        title: metadata.title.trim().to_string(),
        description: metadata.description.trim().to_string(),
        subject: metadata.subject.trim().to_string(),
        semester,
        tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestHub, metadata};

    #[tokio::test]
    async fn test_upload_then_get() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;

        let mut meta = metadata("Graph theory notes", "Mathematics", "Semester 3");
        meta.tags = vec![" graphs".into(), "notes".into(), "graphs".into()];

        let id = hub
            .state
            .catalog
            .upload(alice, &meta, "graphs.pdf", Some("application/pdf".into()), Bytes::from_static(b"pdf"))
            .await
            .unwrap();

        let resource = hub.state.catalog.get(id).await.unwrap();
        assert_eq!(resource.title, "Graph theory notes");
        assert_eq!(resource.semester.to_string(), "Semester 3");
        assert_eq!(resource.tags, vec!["graphs".to_string(), "notes".to_string()]);
        assert_eq!(resource.uploader, "alice");
        assert_eq!(resource.size_bytes, 3);
        assert_eq!(resource.average_rating, 0.0);
        assert_eq!(resource.download_count, 0);

        let bytes = hub.state.catalog.read_blob(&resource).await.unwrap();
        assert_eq!(&bytes[..], b"pdf");
    }

    #[tokio::test]
    async fn test_invalid_semester_is_rejected_before_storing() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;

        let err = hub
            .state
            .catalog
            .upload(alice, &metadata("Notes", "Physics", "Semester 9"), "n.txt", None, Bytes::from_static(b"x"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert!(hub.state.catalog.list(&ResourceFilter::default()).await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(hub.upload_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_required_fields() {
        for (title, description, subject) in [("", "d", "s"), ("t", " ", "s"), ("t", "d", "")] {
            let meta = NewResource {
                title: title.into(),
                description: description.into(),
                subject: subject.into(),
                semester: "Semester 1".into(),
                tags: vec![],
            };
            assert!(matches!(validate_metadata(&meta), Err(ApiError::InvalidArgument(_))));
        }
    }

    #[tokio::test]
    async fn test_create_catalogs_an_already_stored_blob() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;
        let catalog = &hub.state.catalog;

        let blob = BlobRef {
            key: new_blob_key("summary.txt"),
            filename: "summary.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            size_bytes: 7,
        };
        catalog.blobs.put(&blob.key, Bytes::from_static(b"summary")).await.unwrap();

        let id = catalog
            .create(alice, &metadata("Summary", "Economics", "Semester 4"), &blob)
            .await
            .unwrap();

        let resource = catalog.get(id).await.unwrap();
        assert_eq!(resource.filename, "summary.txt");
        assert_eq!(resource.content_type.as_deref(), Some("text/plain"));
        assert_eq!(resource.size_bytes, 7);
        assert_eq!(&catalog.read_blob(&resource).await.unwrap()[..], b"summary");

        let err = catalog
            .create(alice, &metadata("Summary", "Economics", "Semester 0"), &blob)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert_eq!(catalog.list(&ResourceFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_blob() {
        let hub = TestHub::new().await;

        // No such user, so the uploader foreign key rejects the row
        let err = hub
            .state
            .catalog
            .upload(
                Uuid::new_v4(),
                &metadata("Orphan", "Physics", "Semester 1"),
                "orphan.pdf",
                None,
                Bytes::from_static(b"orphan"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Database(_)));
        assert!(hub.state.catalog.list(&ResourceFilter::default()).await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(hub.upload_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_get_unknown_resource() {
        let hub = TestHub::new().await;
        let err = hub.state.catalog.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_semester_filter_is_exact() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;

        let s3 = hub.resource(alice, metadata("Circuits", "Electronics", "Semester 3")).await;
        hub.resource(alice, metadata("Optics", "Physics", "Semester 4")).await;

        let filter = ResourceFilter {
            semester: Some("Semester 3".into()),
            ..Default::default()
        };
        let found = hub.state.catalog.list(&filter).await.unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![s3]);

        let bad = ResourceFilter {
            semester: Some("Semester 33".into()),
            ..Default::default()
        };
        assert!(matches!(
            hub.state.catalog.list(&bad).await,
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_filters_combine_with_and() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;

        let mut algebra = metadata("Linear algebra cheatsheet", "Mathematics", "Semester 1");
        algebra.tags = vec!["exam".into()];
        let algebra = hub.resource(alice, algebra).await;

        let calculus = hub
            .resource(alice, metadata("Calculus notes", "Mathematics", "Semester 1"))
            .await;

        let mut mechanics = metadata("Mechanics problems", "Physics", "Semester 1");
        mechanics.tags = vec!["Exam".into()];
        hub.resource(alice, mechanics).await;

        let subject_only = ResourceFilter {
            subject: Some("math".into()),
            ..Default::default()
        };
        let found = hub.state.catalog.list(&subject_only).await.unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![calculus, algebra]);

        let subject_and_search = ResourceFilter {
            subject: Some("Mathematics".into()),
            search: Some("EXAM".into()),
            ..Default::default()
        };
        let found = hub.state.catalog.list(&subject_and_search).await.unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![algebra]);
    }

    #[tokio::test]
    async fn test_search_matches_title_description_and_tags_literally() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;

        let mut by_description = metadata("Week 1", "Chemistry", "Semester 2");
        by_description.description = "Covers 100% of the syllabus".into();
        let by_description = hub.resource(alice, by_description).await;

        let by_title = hub
            .resource(alice, metadata("Organic SYLLABUS map", "Chemistry", "Semester 2"))
            .await;

        let filter = ResourceFilter {
            search: Some("syllabus".into()),
            ..Default::default()
        };
        let found = hub.state.catalog.list(&filter).await.unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![by_title, by_description]);

        let wildcard = ResourceFilter {
            search: Some("%".into()),
            ..Default::default()
        };
        let found = hub.state.catalog.list(&wildcard).await.unwrap();
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![by_description]);
    }

    #[tokio::test]
    async fn test_listing_order_is_newest_first_and_stable() {
        let hub = TestHub::new().await;
        let alice = hub.user("alice").await;

        let mut ids = Vec::new();
        for title in ["First", "Second", "Third"] {
            ids.push(hub.resource(alice, metadata(title, "History", "Semester 5")).await);
        }
        ids.reverse();

        for _ in 0..3 {
            let listed = hub.state.catalog.list(&ResourceFilter::default()).await.unwrap();
            assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
        }
    }
}
