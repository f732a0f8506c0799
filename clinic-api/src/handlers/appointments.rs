use axum::extract::Extension;
use axum::http::StatusCode;
use clinic_booking::{Availability, DoctorAppointment, PatientAppointment};
use clinic_core::types::{Appointment, AppointmentId, DoctorId};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::response::{self, Reply};
use crate::state::Services;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub doctor_id: DoctorId,
    pub date: String,
    pub time: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    #[serde(flatten)]
    pub slot: SlotRequest,
    pub reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub appointment_id: AppointmentId,
    pub status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRef {
    pub appointment_id: AppointmentId,
}

pub async fn check_availability(
    Extension(services): Extension<Services>,
    ApiJson(body): ApiJson<SlotRequest>,
) -> ApiResult<Reply<Availability>> {
    let availability = services
        .appointments
        .availability()
        .check(body.doctor_id, &body.date, &body.time)
        .await?;
    let message = if availability.is_available {
        "Time slot is available"
    } else {
        "Time slot is not available"
    };
    Ok(response::ok(message, availability))
}

pub async fn book(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<BookRequest>,
) -> ApiResult<Reply<Appointment>> {
    let outcome = services
        .appointments
        .book(&user, body.slot.doctor_id, &body.slot.date, &body.slot.time, &body.reason)
        .await?;
    Ok(response::outcome(StatusCode::CREATED, "Appointment booked successfully", outcome))
}

pub async fn mine(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Reply<Vec<PatientAppointment>>> {
    let appointments = services.appointments.for_patient(user.id).await?;
    Ok(response::ok("Appointments fetched successfully", appointments))
}

pub async fn for_doctor(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Reply<Vec<DoctorAppointment>>> {
    let appointments = services.appointments.for_doctor_user(user.id).await?;
    Ok(response::ok("Appointments fetched successfully", appointments))
}

pub async fn update_status(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Reply<Appointment>> {
    let outcome = services
        .appointments
        .update_status(&user, body.appointment_id, &body.status)
        .await?;
    let message = format!("Appointment {} successfully", outcome.value.status);
    Ok(response::outcome(StatusCode::OK, message, outcome))
}

pub async fn complete(
    Extension(services): Extension<Services>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<AppointmentRef>,
) -> ApiResult<Reply<Appointment>> {
    let outcome = services.appointments.complete(&user, body.appointment_id).await?;
    Ok(response::outcome(StatusCode::OK, "Appointment completed successfully", outcome))
}
