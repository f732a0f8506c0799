pub mod event;
pub mod service;

pub use event::NotificationEvent;
pub use service::{FanOut, NotificationService};
