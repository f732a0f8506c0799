pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod server;
pub mod state;

pub use server::{router, run};
pub use state::Services;
