use clinic_core::slot::{display_date, display_time};
use clinic_core::types::{Appointment, DoctorProfile, Notification, NotificationData, User};

pub const APPLY_DOCTOR_REQUEST: &str = "apply-doctor-request";
pub const DOCTOR_ACCOUNT_STATUS: &str = "doctor-account-status";
pub const DOCTOR_ACCOUNT_DELETED: &str = "doctor-account-deleted";
pub const APPOINTMENT_REQUEST: &str = "appointment-request";
pub const APPOINTMENT_STATUS_UPDATE: &str = "appointment-status-update";
pub const USER_STATUS_CHANGE: &str = "user-status-change";

/// Lifecycle events that end up in somebody's mailbox.
#[derive(Debug, Clone, Copy)]
pub enum NotificationEvent<'a> {
    DoctorApplied {
        doctor: &'a DoctorProfile,
    },
    DoctorStatusChanged {
        doctor: &'a DoctorProfile,
    },
    DoctorDeleted {
        doctor: &'a DoctorProfile,
    },
    AppointmentRequested {
        appointment: &'a Appointment,
        patient_name: &'a str,
    },
    /// `doctor` is `None` when the profile was deleted after booking.
    AppointmentStatusChanged {
        appointment: &'a Appointment,
        doctor: Option<&'a DoctorProfile>,
    },
    UserStatusChanged {
        user: &'a User,
    },
}

impl NotificationEvent<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::DoctorApplied { .. } => APPLY_DOCTOR_REQUEST,
            NotificationEvent::DoctorStatusChanged { .. } => DOCTOR_ACCOUNT_STATUS,
            NotificationEvent::DoctorDeleted { .. } => DOCTOR_ACCOUNT_DELETED,
            NotificationEvent::AppointmentRequested { .. } => APPOINTMENT_REQUEST,
            NotificationEvent::AppointmentStatusChanged { .. } => APPOINTMENT_STATUS_UPDATE,
            NotificationEvent::UserStatusChanged { .. } => USER_STATUS_CHANGE,
        }
    }

    pub fn to_notification(&self) -> Notification {
        let (message, data, on_click_path) = self.format();
        Notification {
            kind: self.kind().to_string(),
            message,
            data,
            on_click_path: on_click_path.map(str::to_string),
        }
    }

    fn format(&self) -> (String, NotificationData, Option<&'static str>) {
        match *self {
            NotificationEvent::DoctorApplied { doctor } => (
                format!("{} has applied for a doctor account", doctor.full_name()),
                NotificationData {
                    doctor_id: Some(doctor.id),
                    name: Some(doctor.full_name()),
                    ..Default::default()
                },
                Some("/admin/doctors"),
            ),
            NotificationEvent::DoctorStatusChanged { doctor } => (
                format!("Your doctor account has been {}", doctor.status),
                NotificationData {
                    doctor_id: Some(doctor.id),
                    status: Some(doctor.status.to_string()),
                    ..Default::default()
                },
                None,
            ),
            NotificationEvent::DoctorDeleted { doctor } => (
                "Your doctor account has been deleted by admin".to_string(),
                NotificationData {
                    doctor_id: Some(doctor.id),
                    ..Default::default()
                },
                None,
            ),
            NotificationEvent::AppointmentRequested { appointment, patient_name } => (
                format!(
                    "New appointment request from {} for {} at {}",
                    patient_name,
                    display_date(appointment.date),
                    display_time(appointment.time)
                ),
                NotificationData {
                    doctor_id: Some(appointment.doctor_id),
                    appointment_id: Some(appointment.id),
                    name: Some(patient_name.to_string()),
                    date: Some(appointment.date),
                    time: Some(display_time(appointment.time)),
                    ..Default::default()
                },
                Some("/doctor/appointments"),
            ),
            NotificationEvent::AppointmentStatusChanged { appointment, doctor } => {
                let doctor_name = doctor
                    .map(DoctorProfile::display_name)
                    .unwrap_or_else(|| "the doctor".to_string());
                (
                    format!(
                        "Your appointment with {} for {} at {} has been {}",
                        doctor_name,
                        display_date(appointment.date),
                        display_time(appointment.time),
                        appointment.status
                    ),
                    NotificationData {
                        appointment_id: Some(appointment.id),
                        status: Some(appointment.status.to_string()),
                        date: Some(appointment.date),
                        time: Some(display_time(appointment.time)),
                        doctor_name: Some(doctor_name),
                        ..Default::default()
                    },
                    Some("/appointments"),
                )
            }
            NotificationEvent::UserStatusChanged { user } => {
                let status = if user.is_blocked { "blocked" } else { "unblocked" };
                (
                    format!("Your account has been {} by admin", status),
                    NotificationData {
                        status: Some(status.to_string()),
                        ..Default::default()
                    },
                    Some("/"),
                )
            }
        }
    }
}
