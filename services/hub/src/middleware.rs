//! Access gate for routes that require an authenticated user

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::debug;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// The user a request was authenticated as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Validate the bearer token and attach the caller to the request
///
/// Requests without a valid access token are rejected before reaching the
/// handler, so no side effect of a protected operation happens for them.
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        debug!("Missing bearer token on {}", req.uri().path());
        return Err(ApiError::Unauthorized);
    };

    let user_id = state.identity.verify(bearer.token())?;

    req.extensions_mut().insert(AuthUser { id: user_id });

    Ok(next.run(req).await)
}

