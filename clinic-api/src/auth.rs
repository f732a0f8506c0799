use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, Method},
    middleware::Next,
    response::Response,
};
use clinic_core::auth::extract_bearer;
use clinic_core::types::{Role, User};
use clinic_core::{AuthFailure, ClinicError};
use tracing;

use crate::error::ApiError;
use crate::state::Services;

const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/auth/login",
    "/auth/register",
    "/auth/external-login",
    "/auth/external-register",
];

/// The caller resolved from the bearer token, re-read from the store on
/// every request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Role implied by the path prefix.
fn required_role(path: &str) -> Role {
    if path.starts_with("/admin/") {
        Role::Admin
    } else if path.starts_with("/doctor/") {
        Role::Doctor
    } else {
        Role::Patient
    }
}

pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, ApiError> {
    if req.method() == Method::OPTIONS || PUBLIC_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }
    let role = required_role(req.uri().path());

    let services = req
        .extensions()
        .get::<Services>()
        .cloned()
        .ok_or_else(|| ClinicError::Internal(anyhow::anyhow!("services extension missing")))?;

    // Owned copy: the request must not stay borrowed across the await.
    let token = {
        let header = req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok());
        extract_bearer(header).map(str::to_string)
    };
    let Some(token) = token else {
        tracing::debug!("Missing bearer token for {}", req.uri().path());
        return Err(AuthFailure::MissingToken.into());
    };

    let user = services.identity.resolve(&token).await?;
    services.identity.authorize(&user, role)?;

    tracing::debug!("Authenticated user {}", user.id);
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
