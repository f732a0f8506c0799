pub mod appointments;
pub mod availability;

pub use appointments::{AppointmentService, DoctorAppointment, DoctorSummary, PatientAppointment, PatientSummary};
pub use availability::{Availability, AvailabilityEngine};
