use serde::Serialize;
use std::collections::HashMap;
use tracing;

use clinic_core::types::{
    Appointment, AppointmentId, AppointmentStatus, DoctorId, DoctorProfile, NewAppointment, Outcome,
    Role, User, UserId,
};
use clinic_core::{ClinicContext, ClinicError, ClinicResult};
use clinic_notify::{NotificationEvent, NotificationService};

use crate::availability::AvailabilityEngine;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub id: DoctorId,
    pub name: String,
    pub specialization: String,
    pub phone: String,
    pub address: String,
    pub fee_per_consultation: i64,
}

impl From<&DoctorProfile> for DoctorSummary {
    fn from(doctor: &DoctorProfile) -> Self {
        DoctorSummary {
            id: doctor.id,
            name: doctor.display_name(),
            specialization: doctor.fields.specialization.clone(),
            phone: doctor.fields.phone.clone(),
            address: doctor.fields.address.clone(),
            fee_per_consultation: doctor.fields.fee_per_consultation,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// A patient's view of one booking. `doctor` is `None` once the profile has
/// been deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: Option<DoctorSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<PatientSummary>,
}

#[derive(Clone)]
pub struct AppointmentService {
    ctx: ClinicContext,
    availability: AvailabilityEngine,
    notifications: NotificationService,
}

impl AppointmentService {
    pub fn new(ctx: ClinicContext) -> Self {
        Self {
            availability: AvailabilityEngine::new(ctx.clone()),
            notifications: NotificationService::new(ctx.clone()),
            ctx,
        }
    }

    pub fn availability(&self) -> &AvailabilityEngine {
        &self.availability
    }

    pub async fn book(
        &self,
        patient: &User,
        doctor_id: DoctorId,
        date: &str,
        time: &str,
        reason: &str,
    ) -> ClinicResult<Outcome<Appointment>> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ClinicError::validation("Reason for the appointment is required"));
        }

        let (doctor, slot) = self.availability.resolve_slot(doctor_id, date, time).await?;
        if doctor.user_id == patient.id {
            return Err(ClinicError::validation("Doctors cannot book their own slots"));
        }

        let appointment = self
            .ctx
            .store
            .insert_appointment(NewAppointment {
                slot,
                user_id: patient.id,
                reason: reason.to_string(),
            })
            .await?
            .ok_or_else(|| {
                tracing::info!("Slot {} {} of doctor {} already taken", slot.date, slot.time, doctor_id);
                ClinicError::conflict("Appointment slot is already booked")
            })?;
        tracing::info!(
            "Booked appointment {} with doctor {} on {} at {}",
            appointment.id,
            doctor_id,
            appointment.date,
            appointment.time
        );

        let warning = self
            .notifications
            .notify_or_warn(
                doctor.user_id,
                NotificationEvent::AppointmentRequested {
                    appointment: &appointment,
                    patient_name: &patient.name,
                },
            )
            .await;
        Ok(Outcome::new(appointment, warning))
    }

    /// Doctor or admin decision on a booking. Only `confirmed` and
    /// `cancelled` are accepted here.
    pub async fn update_status(
        &self,
        actor: &User,
        appointment_id: AppointmentId,
        status: &str,
    ) -> ClinicResult<Outcome<Appointment>> {
        let status = match status.parse::<AppointmentStatus>() {
            Ok(s @ (AppointmentStatus::Confirmed | AppointmentStatus::Cancelled)) => s,
            _ => {
                return Err(ClinicError::validation(
                    "Invalid status. Must be either \"confirmed\" or \"cancelled\"",
                ))
            }
        };
        self.transition(actor, appointment_id, status).await
    }

    pub async fn complete(&self, actor: &User, appointment_id: AppointmentId) -> ClinicResult<Outcome<Appointment>> {
        self.transition(actor, appointment_id, AppointmentStatus::Completed).await
    }

    async fn transition(
        &self,
        actor: &User,
        appointment_id: AppointmentId,
        next: AppointmentStatus,
    ) -> ClinicResult<Outcome<Appointment>> {
        let current = self
            .ctx
            .store
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Appointment not found"))?;
        let doctor = self.ctx.store.find_doctor(current.doctor_id).await?;

        let owns = doctor.as_ref().is_some_and(|d| d.user_id == actor.id);
        if !owns && !actor.has_role(Role::Admin) {
            tracing::warn!("User {} tried to change appointment {}", actor.id, appointment_id);
            return Err(ClinicError::forbidden("You can only manage your own appointments"));
        }
        if !current.status.can_transition_to(next) {
            return Err(ClinicError::validation(format!(
                "Cannot change a {} appointment to {}",
                current.status, next
            )));
        }

        let appointment = self
            .ctx
            .store
            .transition_appointment(appointment_id, current.status, next)
            .await?
            .ok_or_else(|| ClinicError::conflict("Appointment was changed by someone else, please reload"))?;
        tracing::info!("Appointment {} moved from {} to {}", appointment.id, current.status, next);

        let warning = self
            .notifications
            .notify_or_warn(
                appointment.user_id,
                NotificationEvent::AppointmentStatusChanged {
                    appointment: &appointment,
                    doctor: doctor.as_ref(),
                },
            )
            .await;
        Ok(Outcome::new(appointment, warning))
    }

    pub async fn for_patient(&self, user_id: UserId) -> ClinicResult<Vec<PatientAppointment>> {
        let appointments = self.ctx.store.appointments_for_patient(user_id).await?;
        let mut doctors: HashMap<DoctorId, Option<DoctorSummary>> = HashMap::new();
        let mut listing = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            if !doctors.contains_key(&appointment.doctor_id) {
                let summary = self
                    .ctx
                    .store
                    .find_doctor(appointment.doctor_id)
                    .await?
                    .as_ref()
                    .map(DoctorSummary::from);
                doctors.insert(appointment.doctor_id, summary);
            }
            let doctor = doctors.get(&appointment.doctor_id).cloned().flatten();
            listing.push(PatientAppointment { appointment, doctor });
        }
        Ok(listing)
    }

    /// Appointments of the doctor profile owned by `user_id`.
    pub async fn for_doctor_user(&self, user_id: UserId) -> ClinicResult<Vec<DoctorAppointment>> {
        let doctor = self
            .ctx
            .store
            .find_doctor_by_user(user_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Doctor not found"))?;
        let appointments = self.ctx.store.appointments_for_doctor(doctor.id).await?;

        let mut patients: HashMap<UserId, Option<PatientSummary>> = HashMap::new();
        let mut listing = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            if !patients.contains_key(&appointment.user_id) {
                let summary = self.ctx.store.find_user(appointment.user_id).await?.map(|u| PatientSummary {
                    id: u.id,
                    name: u.name,
                    email: u.email,
                });
                patients.insert(appointment.user_id, summary);
            }
            let patient = patients.get(&appointment.user_id).cloned().flatten();
            listing.push(DoctorAppointment { appointment, patient });
        }
        Ok(listing)
    }
}
