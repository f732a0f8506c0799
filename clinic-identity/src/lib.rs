pub mod service;

pub use service::{ExternalIdentity, IdentityService, Session};
