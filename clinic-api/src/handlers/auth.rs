use axum::extract::Extension;
use clinic_core::types::User;
use clinic_identity::{ExternalIdentity, Session};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::response::{self, Reply};
use crate::state::Services;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

pub async fn login(
    Extension(services): Extension<Services>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<Reply<Session>> {
    let session = services.identity.authenticate(&body.email, &body.password).await?;
    Ok(response::ok("Login successful", session))
}

pub async fn register(
    Extension(services): Extension<Services>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> ApiResult<Reply<User>> {
    let user = services.identity.register(&body.name, &body.email, &body.password).await?;
    Ok(response::created("Registration successful", user))
}

/// Serves both external-login and external-register: either way the
/// account is reused or created.
pub async fn external(
    Extension(services): Extension<Services>,
    ApiJson(identity): ApiJson<ExternalIdentity>,
) -> ApiResult<Reply<Session>> {
    let session = services.identity.authenticate_external(identity).await?;
    if session.created {
        Ok(response::created("Registration successful", session))
    } else {
        Ok(response::ok("Login successful", session))
    }
}

pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Reply<User> {
    response::ok("User data fetched successfully", user)
}
