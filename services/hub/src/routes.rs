//! HTTP routes of the resource hub

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::ServerConfig,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{
        LoginRequest, NewResource, RateRequest, RegisterRequest, ResourceFilter,
        resource::parse_tags,
    },
    state::AppState,
};

/// Create the router for the hub service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/upload", post(upload_resource))
        .route("/rate/:id", post(rate_resource))
        .route("/download/:id", get(download_resource))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/dashboard", get(dashboard))
        .route("/resources", get(list_resources))
        .route("/resources/:id", get(get_resource))
        .route("/files/:locator", get(fetch_file))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured browser origins
///
/// `*` allows any origin without credentials; explicit origins may send
/// credentials.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = config.cors_origins();
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if origins.contains(&"*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = matches!(common::database::health_check(&state.db_pool).await, Ok(true));

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "service": "resource-hub",
        "database": database,
    }))
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(bad_body)?;

    let id = state
        .identity
        .register(&payload.username, &payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Exchange credentials for an access token
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(bad_body)?;
    let token = state.identity.login(&payload.username, &payload.password).await?;
    Ok(Json(token))
}

/// Top-rated and most-downloaded resources
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.dashboard.dashboard().await?))
}

/// Filtered resource listing
pub async fn list_resources(
    State(state): State<AppState>,
    filter: Result<Query<ResourceFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) =
        filter.map_err(|e| ApiError::InvalidArgument(e.body_text()))?;
    Ok(Json(state.catalog.list(&filter).await?))
}

/// Get a resource by ID
pub async fn get_resource(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(bad_path)?;
    Ok(Json(state.catalog.get(id).await?))
}

/// Upload a file with its catalog metadata
pub async fn upload_resource(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut metadata = NewResource {
        title: String::new(),
        description: String::new(),
        subject: String::new(),
        semester: String::new(),
        tags: Vec::new(),
    };
    let mut file: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                file = Some((filename, content_type, bytes));
            }
            "title" => metadata.title = field.text().await.map_err(bad_multipart)?,
            "description" => metadata.description = field.text().await.map_err(bad_multipart)?,
            "subject" => metadata.subject = field.text().await.map_err(bad_multipart)?,
            "semester" => metadata.semester = field.text().await.map_err(bad_multipart)?,
            "tags" => metadata.tags = parse_tags(&field.text().await.map_err(bad_multipart)?),
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| ApiError::InvalidArgument("File is required".to_string()))?;

    let id = state
        .catalog
        .upload(user.id, &metadata, &filename, content_type, bytes)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "message": "Resource uploaded successfully",
        })),
    ))
}

/// Count a download and hand out a locator for the bytes
pub async fn download_resource(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(bad_path)?;
    let grant = state.downloads.record_download(id).await?;
    info!("User {} downloading resource {}", user.id, id);
    Ok(Json(grant))
}

/// Rate a resource on the 1-5 scale
pub async fn rate_resource(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RateRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(bad_path)?;
    let Json(payload) = payload.map_err(bad_body)?;

    let summary = state
        .ratings
        .submit(id, user.id, payload.rating, payload.feedback.as_deref())
        .await?;

    Ok(Json(json!({
        "message": "Rating submitted successfully",
        "average_rating": summary.average,
        "rating_count": summary.count,
    })))
}

/// Redeem a download locator for the stored bytes
pub async fn fetch_file(
    State(state): State<AppState>,
    Path(locator): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (resource, bytes) = state.downloads.redeem(&locator).await?;

    let content_type = resource
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_filename(&resource.filename)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect()
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::InvalidArgument(rejection.body_text())
}

fn bad_path(rejection: PathRejection) -> ApiError {
    ApiError::InvalidArgument(rejection.body_text())
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::InvalidArgument(err.body_text())
}
