use tracing;

use clinic_core::types::{
    DoctorFields, DoctorFilter, DoctorId, DoctorProfile, DoctorStatus, NewDoctor, Outcome, Page,
    PageRequest, Role, User, UserId,
};
use clinic_core::{ClinicContext, ClinicError, ClinicResult, StoreError};
use clinic_notify::{NotificationEvent, NotificationService};

const DUPLICATE_IDENTITY: &str = "A doctor with this email or phone number already exists";

fn required(value: &str, field: &str) -> ClinicResult<()> {
    if value.trim().is_empty() {
        return Err(ClinicError::validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Trims free-text fields and lower-cases the email so uniqueness checks
/// compare like with like.
fn normalize(mut fields: DoctorFields) -> ClinicResult<DoctorFields> {
    required(&fields.last_name, "Last name")?;
    required(&fields.phone, "Phone")?;
    required(&fields.email, "Email")?;
    required(&fields.address, "Address")?;
    required(&fields.specialization, "Specialization")?;
    if fields.experience_years < 0 {
        return Err(ClinicError::validation("Experience cannot be negative"));
    }
    if fields.fee_per_consultation < 0 {
        return Err(ClinicError::validation("Consultation fee cannot be negative"));
    }
    if fields.working_hours.start >= fields.working_hours.end {
        return Err(ClinicError::validation("Working hours must start before they end"));
    }

    fields.first_name = fields
        .first_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    fields.website = fields
        .website
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    fields.last_name = fields.last_name.trim().to_string();
    fields.phone = fields.phone.trim().to_string();
    fields.email = fields.email.trim().to_lowercase();
    fields.address = fields.address.trim().to_string();
    fields.specialization = fields.specialization.trim().to_string();
    Ok(fields)
}

fn duplicate_identity(err: StoreError) -> ClinicError {
    match err {
        StoreError::Conflict => ClinicError::conflict(DUPLICATE_IDENTITY),
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct DoctorService {
    ctx: ClinicContext,
    notifications: NotificationService,
}

impl DoctorService {
    pub fn new(ctx: ClinicContext) -> Self {
        let notifications = NotificationService::new(ctx.clone());
        Self { ctx, notifications }
    }

    /// Files a pending application and tells every admin about it.
    pub async fn apply(&self, user_id: UserId, fields: DoctorFields) -> ClinicResult<Outcome<DoctorProfile>> {
        let fields = normalize(fields)?;
        self.ctx
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("User not found"))?;

        let doctor = self
            .ctx
            .store
            .insert_doctor(NewDoctor { user_id, fields })
            .await
            .map_err(|e| match e {
                StoreError::Conflict => ClinicError::conflict("Doctor application already submitted"),
                other => other.into(),
            })?;
        tracing::info!("User {} applied as doctor {}", user_id, doctor.id);

        let warning = match self
            .notifications
            .notify_admins(NotificationEvent::DoctorApplied { doctor: &doctor })
            .await
        {
            Ok(outcome) => outcome.warning("admins"),
            Err(e) => {
                tracing::warn!("Failed to notify admins about doctor {}: {}", doctor.id, e);
                Some("Admins could not be notified".to_string())
            }
        };
        Ok(Outcome::new(doctor, warning))
    }

    /// Public listing: approved profiles only, newest first.
    pub async fn list_approved(
        &self,
        specialization: Option<String>,
        page: PageRequest,
    ) -> ClinicResult<Page<DoctorProfile>> {
        let filter = DoctorFilter {
            status: Some(DoctorStatus::Approved),
            specialization: specialization.filter(|s| !s.trim().is_empty()),
        };
        self.list(&filter, page).await
    }

    pub async fn list(&self, filter: &DoctorFilter, page: PageRequest) -> ClinicResult<Page<DoctorProfile>> {
        let (doctors, total) = self.ctx.store.list_doctors(filter, page).await?;
        Ok(Page::new(doctors, total, page))
    }

    pub async fn get(&self, doctor_id: DoctorId) -> ClinicResult<DoctorProfile> {
        self.ctx
            .store
            .find_doctor(doctor_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Doctor not found"))
    }

    /// Unapproved profiles are only visible to their owner and to admins.
    pub async fn view(&self, viewer: &User, doctor_id: DoctorId) -> ClinicResult<DoctorProfile> {
        let doctor = self.get(doctor_id).await?;
        if doctor.is_approved() || doctor.user_id == viewer.id || viewer.has_role(Role::Admin) {
            Ok(doctor)
        } else {
            Err(ClinicError::not_found("Doctor not found"))
        }
    }

    pub async fn profile_for_user(&self, user_id: UserId) -> ClinicResult<DoctorProfile> {
        self.ctx
            .store
            .find_doctor_by_user(user_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Doctor profile not found"))
    }

    pub async fn update_profile(&self, user_id: UserId, fields: DoctorFields) -> ClinicResult<DoctorProfile> {
        let fields = normalize(fields)?;
        let current = self.profile_for_user(user_id).await?;
        let doctor = self
            .ctx
            .store
            .update_doctor_fields(current.id, fields)
            .await
            .map_err(duplicate_identity)?
            .ok_or_else(|| ClinicError::not_found("Doctor profile not found"))?;
        tracing::info!("Doctor {} updated their profile", doctor.id);
        Ok(doctor)
    }

    pub async fn change_status(
        &self,
        doctor_id: DoctorId,
        status: DoctorStatus,
    ) -> ClinicResult<Outcome<DoctorProfile>> {
        let previous = self
            .ctx
            .store
            .find_doctor(doctor_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Doctor application not found"))?;

        let doctor = self
            .ctx
            .store
            .update_doctor_status(doctor_id, status)
            .await
            .map_err(duplicate_identity)?
            .ok_or_else(|| ClinicError::not_found("Doctor application not found"))?;

        tracing::info!("Doctor {} moved from {} to {}", doctor.id, previous.status, doctor.status);

        let warning = self
            .notifications
            .notify_or_warn(doctor.user_id, NotificationEvent::DoctorStatusChanged { doctor: &doctor })
            .await;
        Ok(Outcome::new(doctor, warning))
    }

    /// Hard delete. Existing appointments keep their doctor id.
    pub async fn delete(&self, doctor_id: DoctorId) -> ClinicResult<Outcome<DoctorProfile>> {
        let doctor = self
            .ctx
            .store
            .delete_doctor(doctor_id)
            .await?
            .ok_or_else(|| ClinicError::not_found("Doctor not found"))?;
        tracing::info!("Deleted doctor {}", doctor.id);

        let warning = self
            .notifications
            .notify_or_warn(doctor.user_id, NotificationEvent::DoctorDeleted { doctor: &doctor })
            .await;
        Ok(Outcome::new(doctor, warning))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use clinic_core::types::{NewUser, WorkingHours};
    use clinic_core::{Config, MemoryStore};
    use std::sync::Arc;

    fn service() -> (ClinicContext, DoctorService) {
        let ctx = ClinicContext::with_store(Config::default(), Arc::new(MemoryStore::new()));
        (ctx.clone(), DoctorService::new(ctx))
    }

    async fn user(ctx: &ClinicContext, email: &str, admin: bool) -> User {
        let mut new_user = NewUser::local("Someone", email, "hash");
        new_user.is_admin = admin;
        ctx.store.insert_user(new_user).await.unwrap()
    }

    fn fields(email: &str, phone: &str, specialization: &str) -> DoctorFields {
        DoctorFields {
            first_name: Some(" Meredith ".to_string()),
            last_name: "Grey".to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            website: Some("".to_string()),
            address: "Seattle Grace".to_string(),
            specialization: specialization.to_string(),
            experience_years: 10,
            fee_per_consultation: 1200,
            working_hours: WorkingHours {
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            },
        }
    }

    #[tokio::test]
    async fn test_apply_notifies_every_admin() {
        let (ctx, doctors) = service();
        let admin_a = user(&ctx, "a@example.com", true).await;
        let admin_b = user(&ctx, "b@example.com", true).await;
        let applicant = user(&ctx, "doc@example.com", false).await;

        let outcome = doctors
            .apply(applicant.id, fields("Doc@Example.com", "555", "surgery"))
            .await
            .unwrap();
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.value.status, DoctorStatus::Pending);
        assert_eq!(outcome.value.fields.email, "doc@example.com");
        assert_eq!(outcome.value.fields.first_name.as_deref(), Some("Meredith"));
        assert!(outcome.value.fields.website.is_none());

        for admin in [admin_a, admin_b] {
            let mailbox = ctx.store.notifications(admin.id, false, 10).await.unwrap();
            assert_eq!(mailbox.len(), 1);
            assert_eq!(mailbox[0].notification.kind, "apply-doctor-request");
        }

        let err = doctors
            .apply(applicant.id, fields("doc@example.com", "555", "surgery"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_apply_without_admins_warns() {
        let (ctx, doctors) = service();
        let applicant = user(&ctx, "doc@example.com", false).await;
        let outcome = doctors
            .apply(applicant.id, fields("doc@example.com", "555", "surgery"))
            .await
            .unwrap();
        assert!(outcome.warning.is_some());
    }

    #[tokio::test]
    async fn test_apply_rejects_inverted_hours() {
        let (ctx, doctors) = service();
        let applicant = user(&ctx, "doc@example.com", false).await;
        let mut bad = fields("doc@example.com", "555", "surgery");
        bad.working_hours.end = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert!(matches!(doctors.apply(applicant.id, bad).await.unwrap_err(), ClinicError::Validation(_)));
    }

    #[tokio::test]
    async fn test_approval_sets_flag_and_guards_identity() {
        let (ctx, doctors) = service();
        let first = user(&ctx, "one@example.com", false).await;
        let second = user(&ctx, "two@example.com", false).await;
        let d1 = doctors.apply(first.id, fields("same@example.com", "111", "surgery")).await.unwrap().value;
        let d2 = doctors.apply(second.id, fields("same@example.com", "222", "surgery")).await.unwrap().value;

        let approved = doctors.change_status(d1.id, DoctorStatus::Approved).await.unwrap();
        assert!(approved.value.is_approved());
        assert!(ctx.store.find_user(first.id).await.unwrap().unwrap().is_doctor);
        let mailbox = ctx.store.notifications(first.id, false, 10).await.unwrap();
        assert_eq!(mailbox[0].notification.message, "Your doctor account has been approved");

        let err = doctors.change_status(d2.id, DoctorStatus::Approved).await.unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));
        assert!(!ctx.store.find_user(second.id).await.unwrap().unwrap().is_doctor);

        doctors.change_status(d1.id, DoctorStatus::Rejected).await.unwrap();
        assert!(!ctx.store.find_user(first.id).await.unwrap().unwrap().is_doctor);
    }

    #[tokio::test]
    async fn test_public_listing_shows_approved_only() {
        let (ctx, doctors) = service();
        let mut ids = Vec::new();
        for (i, spec) in ["surgery", "surgery", "pediatrics"].iter().enumerate() {
            let owner = user(&ctx, &format!("u{}@example.com", i), false).await;
            let doc = doctors
                .apply(owner.id, fields(&format!("d{}@example.com", i), &format!("{}", i), spec))
                .await
                .unwrap()
                .value;
            ids.push(doc.id);
        }
        doctors.change_status(ids[0], DoctorStatus::Approved).await.unwrap();
        doctors.change_status(ids[2], DoctorStatus::Approved).await.unwrap();

        let page = doctors.list_approved(None, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
        // Newest first.
        assert_eq!(page.items[0].id, ids[2]);

        let page = doctors
            .list_approved(Some("surgery".to_string()), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, ids[0]);

        let pending = doctors
            .list(&DoctorFilter { status: Some(DoctorStatus::Pending), specialization: None }, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(pending.total, 1);
    }

    #[tokio::test]
    async fn test_delete_clears_doctor_flag() {
        let (ctx, doctors) = service();
        let owner = user(&ctx, "doc@example.com", false).await;
        let doc = doctors.apply(owner.id, fields("doc@example.com", "555", "surgery")).await.unwrap().value;
        doctors.change_status(doc.id, DoctorStatus::Approved).await.unwrap();

        let deleted = doctors.delete(doc.id).await.unwrap();
        assert_eq!(deleted.value.id, doc.id);
        assert!(!ctx.store.find_user(owner.id).await.unwrap().unwrap().is_doctor);
        assert!(matches!(doctors.get(doc.id).await.unwrap_err(), ClinicError::NotFound(_)));
        assert!(matches!(doctors.delete(doc.id).await.unwrap_err(), ClinicError::NotFound(_)));

        let mailbox = ctx.store.notifications(owner.id, false, 10).await.unwrap();
        assert_eq!(mailbox.last().unwrap().notification.kind, "doctor-account-deleted");
    }

    #[tokio::test]
    async fn test_profile_visibility_and_update() {
        let (ctx, doctors) = service();
        let owner = user(&ctx, "doc@example.com", false).await;
        let stranger = user(&ctx, "x@example.com", false).await;
        let doc = doctors.apply(owner.id, fields("doc@example.com", "555", "surgery")).await.unwrap().value;

        assert!(doctors.view(&owner, doc.id).await.is_ok());
        assert!(matches!(doctors.view(&stranger, doc.id).await.unwrap_err(), ClinicError::NotFound(_)));

        let mut changed = fields("doc@example.com", "556", "cardiology");
        changed.experience_years = 11;
        let updated = doctors.update_profile(owner.id, changed).await.unwrap();
        assert_eq!(updated.fields.specialization, "cardiology");
        assert_eq!(doctors.profile_for_user(owner.id).await.unwrap().fields.phone, "556");
        assert!(matches!(
            doctors.profile_for_user(stranger.id).await.unwrap_err(),
            ClinicError::NotFound(_)
        ));
    }
}
