use axum::http::StatusCode;
use axum::Json;
use clinic_core::types::Outcome;
use serde::Serialize;

/// Success body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub type Reply<T> = (StatusCode, Json<Envelope<T>>);

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Reply<T> {
    reply(StatusCode::OK, message, data, None)
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Reply<T> {
    reply(StatusCode::CREATED, message, data, None)
}

/// Success whose follow-up notification may have failed.
pub fn outcome<T: Serialize>(status: StatusCode, message: impl Into<String>, outcome: Outcome<T>) -> Reply<T> {
    reply(status, message, outcome.value, outcome.warning)
}

fn reply<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T, warning: Option<String>) -> Reply<T> {
    (
        status,
        Json(Envelope {
            success: true,
            message: message.into(),
            data: Some(data),
            warning,
        }),
    )
}
