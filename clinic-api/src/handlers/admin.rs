use axum::extract::Extension;
use axum::http::StatusCode;
use clinic_core::types::{DoctorFilter, DoctorId, DoctorProfile, DoctorStatus, Page, PageRequest, User, UserId};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::response::{self, Reply};
use crate::state::Services;

#[derive(Deserialize)]
pub struct AdminDoctorQuery {
    pub status: Option<String>,
    pub specialization: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorStatusRequest {
    pub doctor_id: DoctorId,
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub user_id: UserId,
}

pub async fn doctors(
    Extension(services): Extension<Services>,
    ApiQuery(query): ApiQuery<AdminDoctorQuery>,
) -> ApiResult<Reply<Page<DoctorProfile>>> {
    let status = match query.status.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(s.parse::<DoctorStatus>()?),
        _ => None,
    };
    let filter = DoctorFilter {
        status,
        specialization: query.specialization.filter(|s| !s.trim().is_empty()),
    };
    let page = PageRequest::new(query.page, query.limit);
    let doctors = services.doctors.list(&filter, page).await?;
    Ok(response::ok("Doctors data retrieved successfully", doctors))
}

pub async fn change_doctor_status(
    Extension(services): Extension<Services>,
    ApiJson(body): ApiJson<DoctorStatusRequest>,
) -> ApiResult<Reply<DoctorProfile>> {
    let status = body.status.parse::<DoctorStatus>()?;
    let outcome = services.doctors.change_status(body.doctor_id, status).await?;
    let message = format!("Doctor status updated to {}", outcome.value.status);
    Ok(response::outcome(StatusCode::OK, message, outcome))
}

pub async fn delete_doctor(
    Extension(services): Extension<Services>,
    ApiPath(doctor_id): ApiPath<DoctorId>,
) -> ApiResult<Reply<DoctorProfile>> {
    let outcome = services.doctors.delete(doctor_id).await?;
    Ok(response::outcome(StatusCode::OK, "Doctor deleted successfully", outcome))
}

pub async fn users(
    Extension(services): Extension<Services>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Reply<Page<User>>> {
    let users = services.identity.list_users(PageRequest::new(query.page, query.limit)).await?;
    Ok(response::ok("Users data retrieved successfully", users))
}

pub async fn block_user(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<BlockRequest>,
) -> ApiResult<Reply<User>> {
    let outcome = services.identity.toggle_block(admin.id, body.user_id).await?;
    let message = if outcome.value.is_blocked {
        "User blocked successfully"
    } else {
        "User unblocked successfully"
    };
    Ok(response::outcome(StatusCode::OK, message, outcome))
}
