use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing;

use clinic_core::slot::{check_working_hours, parse_date, parse_time};
use clinic_core::types::{AppointmentStatus, DoctorId, DoctorProfile, Slot};
use clinic_core::{ClinicContext, ClinicError, ClinicResult};

/// Answer to "can this slot be booked right now". Never names the patient
/// holding a taken slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub is_available: bool,
    pub conflicting_status: Option<AppointmentStatus>,
}

#[derive(Clone)]
pub struct AvailabilityEngine {
    ctx: ClinicContext,
}

impl AvailabilityEngine {
    pub fn new(ctx: ClinicContext) -> Self {
        Self { ctx }
    }

    /// Advisory check. Booking repeats it and relies on the store's
    /// conditional insert for the final word.
    pub async fn check(&self, doctor_id: DoctorId, date: &str, time: &str) -> ClinicResult<Availability> {
        let (_, slot) = self.resolve_slot(doctor_id, date, time).await?;
        let holder = self.ctx.store.find_slot_holder(&slot).await?;
        Ok(Availability {
            is_available: holder.is_none(),
            conflicting_status: holder.map(|a| a.status),
        })
    }

    /// Normalizes the raw date and time and validates them against the
    /// doctor's schedule.
    pub async fn resolve_slot(
        &self,
        doctor_id: DoctorId,
        date: &str,
        time: &str,
    ) -> ClinicResult<(DoctorProfile, Slot)> {
        self.resolve_slot_at(doctor_id, date, time, Local::now().naive_local()).await
    }

    async fn resolve_slot_at(
        &self,
        doctor_id: DoctorId,
        date: &str,
        time: &str,
        now: NaiveDateTime,
    ) -> ClinicResult<(DoctorProfile, Slot)> {
        let date = parse_date(date)?;
        let time = parse_time(time)?;

        let doctor = self
            .ctx
            .store
            .find_doctor(doctor_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Doctor not found"))?;
        if !doctor.is_approved() {
            return Err(ClinicError::validation("Doctor is not accepting appointments"));
        }

        check_working_hours(&doctor.fields.working_hours, time, self.ctx.config.booking.slot_minutes)?;
        if date.and_time(time) < now {
            tracing::debug!("Rejected past slot {} {} for doctor {}", date, time, doctor_id);
            return Err(ClinicError::validation("Cannot book an appointment in the past"));
        }

        Ok((doctor, Slot { doctor_id, date, time }))
    }
}
