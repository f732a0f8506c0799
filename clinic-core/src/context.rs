use std::sync::Arc;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::store::{PgStore, Store};

#[derive(Clone)]
pub struct ClinicContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenKeys,
}

impl ClinicContext {
    /// Connects to Postgres and brings the schema up to date.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        run_migrations(&config.database).await?;
        let db_pool = create_pool(&config.database).await?;
        Ok(Self::with_store(config, Arc::new(PgStore::new(db_pool))))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Self {
        let tokens = TokenKeys::from_secret(&config.server.jwt_secret);
        ClinicContext {
            config: Arc::new(config),
            store,
            tokens,
        }
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.server.token_ttl_hours)
    }
}
