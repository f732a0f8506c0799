use axum::response::Json;

pub mod admin;
pub mod appointments;
pub mod auth;
pub mod doctors;
pub mod notifications;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "clinic-api"
    }))
}
