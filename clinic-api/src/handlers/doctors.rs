use axum::extract::Extension;
use axum::http::StatusCode;
use clinic_core::types::{DoctorFields, DoctorId, DoctorProfile, Page, PageRequest};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::response::{self, Reply};
use crate::state::Services;

#[derive(Deserialize)]
pub struct DoctorQuery {
    pub specialization: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list(
    Extension(services): Extension<Services>,
    ApiQuery(query): ApiQuery<DoctorQuery>,
) -> ApiResult<Reply<Page<DoctorProfile>>> {
    let page = PageRequest::new(query.page, query.limit);
    let doctors = services.doctors.list_approved(query.specialization, page).await?;
    Ok(response::ok("Doctors list fetched successfully", doctors))
}

pub async fn get(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(doctor_id): ApiPath<DoctorId>,
) -> ApiResult<Reply<DoctorProfile>> {
    let doctor = services.doctors.view(&user, doctor_id).await?;
    Ok(response::ok("Doctor information fetched successfully", doctor))
}

pub async fn apply(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(fields): ApiJson<DoctorFields>,
) -> ApiResult<Reply<DoctorProfile>> {
    let outcome = services.doctors.apply(user.id, fields).await?;
    Ok(response::outcome(
        StatusCode::CREATED,
        "Doctor application submitted successfully",
        outcome,
    ))
}

pub async fn own_profile(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Reply<DoctorProfile>> {
    let doctor = services.doctors.profile_for_user(user.id).await?;
    Ok(response::ok("Doctor information fetched successfully", doctor))
}

pub async fn update_profile(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(fields): ApiJson<DoctorFields>,
) -> ApiResult<Reply<DoctorProfile>> {
    let doctor = services.doctors.update_profile(user.id, fields).await?;
    Ok(response::ok("Doctor profile updated successfully", doctor))
}
