pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod schema;
pub mod slot;
pub mod store;
pub mod types;

pub use config::Config;
pub use context::ClinicContext;
pub use db::DbPool;
pub use error::{AuthFailure, ClinicError, ClinicResult, StoreError, StoreResult};
pub use store::{MemoryStore, PgStore, Store};
