use anyhow::Result;
use clinic_api::run as run_api;
use clinic_core::{ClinicContext, Config};
use clinic_identity::IdentityService;
use tracing;
use tracing_subscriber;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting clinic booking service");

    let config = Config::from_env();
    let ctx = ClinicContext::new(config).await?;
    tracing::info!("Clinic context initialized");

    let bootstrap = ctx.config.admin.bootstrap_emails.clone();
    if !bootstrap.is_empty() {
        let promoted = IdentityService::new(ctx.clone()).promote_admins(&bootstrap).await?;
        tracing::info!("Admin bootstrap promoted {} account(s)", promoted);
    }

    run_api(ctx).await?;

    Ok(())
}
