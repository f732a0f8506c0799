pub mod service;

pub use service::DoctorService;
