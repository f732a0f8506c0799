//! Persistence seam.
//!
//! Services only talk to [`Store`]. Every write that guards an invariant is a
//! single atomic operation on the implementation side: a booking either lands
//! in a free slot or reports the slot as taken, an approval either keeps the
//! approved email/phone unique or fails with [`StoreError::Conflict`], and a
//! notification append never rewrites the rest of the mailbox.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{
    Appointment, AppointmentId, AppointmentStatus, DoctorFields, DoctorFilter, DoctorId,
    DoctorProfile, DoctorStatus, NewAppointment, NewDoctor, NewUser, Notification, PageRequest,
    Slot, StoredNotification, User, UserId,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    // Users

    /// Fails with `Conflict` when the email is already registered.
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self, page: PageRequest) -> StoreResult<(Vec<User>, i64)>;
    async fn admin_ids(&self) -> StoreResult<Vec<UserId>>;
    /// Flips `is_blocked` in one write and returns the new state.
    async fn toggle_user_blocked(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn set_user_admin(&self, id: UserId, is_admin: bool) -> StoreResult<Option<User>>;

    // Doctors

    /// Fails with `Conflict` when the user already owns a profile.
    async fn insert_doctor(&self, doctor: NewDoctor) -> StoreResult<DoctorProfile>;
    async fn find_doctor(&self, id: DoctorId) -> StoreResult<Option<DoctorProfile>>;
    async fn find_doctor_by_user(&self, user_id: UserId) -> StoreResult<Option<DoctorProfile>>;
    async fn list_doctors(
        &self,
        filter: &DoctorFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<DoctorProfile>, i64)>;
    /// Fails with `Conflict` when approving would duplicate an approved
    /// email or phone. The owner's `is_doctor` flag is set to match the new
    /// status in the same write.
    async fn update_doctor_status(
        &self,
        id: DoctorId,
        status: DoctorStatus,
    ) -> StoreResult<Option<DoctorProfile>>;
    /// Same uniqueness rule as `update_doctor_status` for approved profiles.
    async fn update_doctor_fields(
        &self,
        id: DoctorId,
        fields: DoctorFields,
    ) -> StoreResult<Option<DoctorProfile>>;
    /// Removes the profile and clears the owner's `is_doctor` flag together.
    async fn delete_doctor(&self, id: DoctorId) -> StoreResult<Option<DoctorProfile>>;

    // Appointments

    /// The appointment currently occupying the slot, if any.
    async fn find_slot_holder(&self, slot: &Slot) -> StoreResult<Option<Appointment>>;
    /// Conditional insert. `None` means the slot is already occupied.
    async fn insert_appointment(&self, appointment: NewAppointment) -> StoreResult<Option<Appointment>>;
    async fn find_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>>;
    /// Compare-and-set on status. `None` when the row is missing or no
    /// longer holds `from`.
    async fn transition_appointment(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> StoreResult<Option<Appointment>>;
    async fn appointments_for_patient(&self, user_id: UserId) -> StoreResult<Vec<Appointment>>;
    async fn appointments_for_doctor(&self, doctor_id: DoctorId) -> StoreResult<Vec<Appointment>>;

    // Notifications

    async fn append_notification(&self, user_id: UserId, notification: &Notification) -> StoreResult<()>;
    /// The newest `limit` entries of one partition, oldest first.
    async fn notifications(
        &self,
        user_id: UserId,
        seen: bool,
        limit: i64,
    ) -> StoreResult<Vec<StoredNotification>>;
    async fn count_notifications(&self, user_id: UserId, seen: bool) -> StoreResult<i64>;
    async fn mark_notifications_seen(&self, user_id: UserId) -> StoreResult<u64>;
    async fn delete_seen_notifications(&self, user_id: UserId) -> StoreResult<u64>;
}
