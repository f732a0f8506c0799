use anyhow::Result;
use axum::{
    extract::Extension,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
    Router,
};
use clinic_core::ClinicContext;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing;

use crate::auth;
use crate::handlers::{self, admin, appointments, doctors, notifications};
use crate::state::Services;

fn cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .filter_map(|o| o.parse::<HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => {
            tracing::warn!("CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!");
            CorsLayer::permissive()
        }
    }
}

pub fn router(services: Services) -> Router {
    let cors = cors_layer(services.ctx.config.server.cors_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/external-login", post(handlers::auth::external))
        .route("/auth/external-register", post(handlers::auth::external))
        .route("/users/me", get(handlers::auth::me))
        .route("/doctors", get(doctors::list))
        .route("/doctors/apply", post(doctors::apply))
        .route("/doctors/:id", get(doctors::get))
        .route("/appointments/check-availability", post(appointments::check_availability))
        .route("/appointments/book", post(appointments::book))
        .route("/appointments/mine", get(appointments::mine))
        .route("/doctor/profile", get(doctors::own_profile).post(doctors::update_profile))
        .route("/doctor/appointments", post(appointments::for_doctor))
        .route("/doctor/appointments/status", post(appointments::update_status))
        .route("/doctor/appointments/complete", post(appointments::complete))
        .route("/admin/doctors", get(admin::doctors))
        .route("/admin/doctors/status", post(admin::change_doctor_status))
        .route("/admin/doctors/:id", delete(admin::delete_doctor))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/block", post(admin::block_user))
        .route("/notifications", get(notifications::mailbox))
        .route("/notifications/mark-read", post(notifications::mark_read))
        .route("/notifications/delete-read", post(notifications::delete_read))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(Extension(services))
                .layer(middleware::from_fn(auth::auth_middleware)),
        )
}

pub async fn run(ctx: ClinicContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.api_port).parse()?;
    let app = router(Services::new(ctx));

    tracing::info!("Starting API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
