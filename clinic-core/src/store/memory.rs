//! In-process [`Store`] used by tests and local experiments.
//!
//! A single mutex guards the whole state, so every trait method is atomic
//! with respect to every other one.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Appointment, AppointmentId, AppointmentStatus, DoctorFields, DoctorFilter, DoctorId,
    DoctorProfile, DoctorStatus, NewAppointment, NewDoctor, NewUser, Notification, PageRequest,
    Slot, StoredNotification, User, UserId,
};

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    doctors: BTreeMap<DoctorId, DoctorProfile>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    notifications: Vec<(UserId, StoredNotification)>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn approved_collision(&self, id: DoctorId, fields: &DoctorFields) -> bool {
        self.doctors.values().any(|other| {
            other.id != id
                && other.is_approved()
                && (other.fields.email == fields.email || other.fields.phone == fields.phone)
        })
    }

    fn update_user(&mut self, id: UserId, apply: impl FnOnce(&mut User)) -> Option<User> {
        let user = self.users.get_mut(&id)?;
        apply(user);
        user.updated_at = Utc::now();
        Some(user.clone())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T: Clone>(items: Vec<T>, page: PageRequest) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let window = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect();
    (window, total)
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().await;
        if !user.has_credential() {
            return Err(StoreError::Corrupt("user without password or external id".to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict);
        }
        let now = Utc::now();
        let id = state.next_id();
        let record = User {
            id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            is_doctor: false,
            is_blocked: false,
            is_verified: user.is_verified,
            external_id: user.external_id,
            picture: user.picture,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, page: PageRequest) -> StoreResult<(Vec<User>, i64)> {
        let state = self.state.lock().await;
        Ok(paginate(state.users.values().cloned().collect(), page))
    }

    async fn admin_ids(&self) -> StoreResult<Vec<UserId>> {
        let state = self.state.lock().await;
        Ok(state.users.values().filter(|u| u.is_admin).map(|u| u.id).collect())
    }

    async fn toggle_user_blocked(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.update_user(id, |u| u.is_blocked = !u.is_blocked))
    }

    async fn set_user_admin(&self, id: UserId, is_admin: bool) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.update_user(id, |u| u.is_admin = is_admin))
    }

    async fn insert_doctor(&self, doctor: NewDoctor) -> StoreResult<DoctorProfile> {
        let mut state = self.state.lock().await;
        if state.doctors.values().any(|d| d.user_id == doctor.user_id) {
            return Err(StoreError::Conflict);
        }
        let now = Utc::now();
        let id = state.next_id();
        let record = DoctorProfile {
            id,
            user_id: doctor.user_id,
            fields: doctor.fields,
            status: DoctorStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.doctors.insert(id, record.clone());
        Ok(record)
    }

    async fn find_doctor(&self, id: DoctorId) -> StoreResult<Option<DoctorProfile>> {
        Ok(self.state.lock().await.doctors.get(&id).cloned())
    }

    async fn find_doctor_by_user(&self, user_id: UserId) -> StoreResult<Option<DoctorProfile>> {
        let state = self.state.lock().await;
        Ok(state.doctors.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn list_doctors(
        &self,
        filter: &DoctorFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<DoctorProfile>, i64)> {
        let state = self.state.lock().await;
        let matching: Vec<DoctorProfile> = state
            .doctors
            .values()
            .rev()
            .filter(|d| filter.status.map_or(true, |s| d.status == s))
            .filter(|d| {
                filter
                    .specialization
                    .as_deref()
                    .map_or(true, |s| d.fields.specialization == s)
            })
            .cloned()
            .collect();
        Ok(paginate(matching, page))
    }

    async fn update_doctor_status(
        &self,
        id: DoctorId,
        status: DoctorStatus,
    ) -> StoreResult<Option<DoctorProfile>> {
        let mut state = self.state.lock().await;
        let collides = match state.doctors.get(&id) {
            Some(current) => status == DoctorStatus::Approved && state.approved_collision(id, &current.fields),
            None => return Ok(None),
        };
        if collides {
            return Err(StoreError::Conflict);
        }
        let Some(doctor) = state.doctors.get_mut(&id) else {
            return Ok(None);
        };
        doctor.status = status;
        doctor.updated_at = Utc::now();
        let doctor = doctor.clone();
        state.update_user(doctor.user_id, |u| u.is_doctor = status == DoctorStatus::Approved);
        Ok(Some(doctor))
    }

    async fn update_doctor_fields(
        &self,
        id: DoctorId,
        fields: DoctorFields,
    ) -> StoreResult<Option<DoctorProfile>> {
        let mut state = self.state.lock().await;
        let collides = match state.doctors.get(&id) {
            Some(current) => current.is_approved() && state.approved_collision(id, &fields),
            None => return Ok(None),
        };
        if collides {
            return Err(StoreError::Conflict);
        }
        let Some(doctor) = state.doctors.get_mut(&id) else {
            return Ok(None);
        };
        doctor.fields = fields;
        doctor.updated_at = Utc::now();
        Ok(Some(doctor.clone()))
    }

    async fn delete_doctor(&self, id: DoctorId) -> StoreResult<Option<DoctorProfile>> {
        let mut state = self.state.lock().await;
        let Some(doctor) = state.doctors.remove(&id) else {
            return Ok(None);
        };
        state.update_user(doctor.user_id, |u| u.is_doctor = false);
        Ok(Some(doctor))
    }

    async fn find_slot_holder(&self, slot: &Slot) -> StoreResult<Option<Appointment>> {
        let state = self.state.lock().await;
        Ok(state
            .appointments
            .values()
            .find(|a| a.status.occupies_slot() && a.slot() == *slot)
            .cloned())
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> StoreResult<Option<Appointment>> {
        let mut state = self.state.lock().await;
        let taken = state
            .appointments
            .values()
            .any(|a| a.status.occupies_slot() && a.slot() == appointment.slot);
        if taken {
            return Ok(None);
        }
        let now = Utc::now();
        let id = state.next_id();
        let record = Appointment {
            id,
            doctor_id: appointment.slot.doctor_id,
            user_id: appointment.user_id,
            date: appointment.slot.date,
            time: appointment.slot.time,
            reason: appointment.reason,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        state.appointments.insert(id, record.clone());
        Ok(Some(record))
    }

    async fn find_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        Ok(self.state.lock().await.appointments.get(&id).cloned())
    }

    async fn transition_appointment(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> StoreResult<Option<Appointment>> {
        let mut state = self.state.lock().await;
        match state.appointments.get_mut(&id) {
            Some(appointment) if appointment.status == from => {
                appointment.status = to;
                appointment.updated_at = Utc::now();
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn appointments_for_patient(&self, user_id: UserId) -> StoreResult<Vec<Appointment>> {
        let state = self.state.lock().await;
        let mut list: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.date, a.time, a.id));
        Ok(list)
    }

    async fn appointments_for_doctor(&self, doctor_id: DoctorId) -> StoreResult<Vec<Appointment>> {
        let state = self.state.lock().await;
        let mut list: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| (a.date, a.time, a.id));
        Ok(list)
    }

    async fn append_notification(&self, user_id: UserId, notification: &Notification) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::Corrupt(format!("no user {}", user_id)));
        }
        let id = state.next_id();
        state.notifications.push((
            user_id,
            StoredNotification {
                id,
                notification: notification.clone(),
                seen_at: None,
                created_at: Utc::now(),
            },
        ));
        Ok(())
    }

    async fn notifications(
        &self,
        user_id: UserId,
        seen: bool,
        limit: i64,
    ) -> StoreResult<Vec<StoredNotification>> {
        let state = self.state.lock().await;
        let mut partition: Vec<StoredNotification> = state
            .notifications
            .iter()
            .filter(|(owner, n)| *owner == user_id && n.seen_at.is_some() == seen)
            .map(|(_, n)| n.clone())
            .collect();
        partition.sort_by_key(|n| (n.seen_at, n.id));
        let skip = partition.len().saturating_sub(limit.max(0) as usize);
        Ok(partition.split_off(skip))
    }

    async fn count_notifications(&self, user_id: UserId, seen: bool) -> StoreResult<i64> {
        let state = self.state.lock().await;
        let count = state
            .notifications
            .iter()
            .filter(|(owner, n)| *owner == user_id && n.seen_at.is_some() == seen)
            .count();
        Ok(count as i64)
    }

    async fn mark_notifications_seen(&self, user_id: UserId) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut moved = 0;
        for (owner, n) in state.notifications.iter_mut() {
            if *owner == user_id && n.seen_at.is_none() {
                n.seen_at = Some(now);
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn delete_seen_notifications(&self, user_id: UserId) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.notifications.len();
        state
            .notifications
            .retain(|(owner, n)| !(*owner == user_id && n.seen_at.is_some()));
        Ok((before - state.notifications.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkingHours;
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Arc;

    fn fields(email: &str, phone: &str) -> DoctorFields {
        DoctorFields {
            first_name: Some("Grace".to_string()),
            last_name: "Hopper".to_string(),
            phone: phone.to_string(),
            email: email.to_string(),
            website: None,
            address: "1 Main St".to_string(),
            specialization: "cardiology".to_string(),
            experience_years: 7,
            fee_per_consultation: 500,
            working_hours: WorkingHours::new(
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            )
            .unwrap(),
        }
    }

    fn slot(doctor_id: DoctorId) -> Slot {
        Slot {
            doctor_id,
            date: NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        }
    }

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(NewUser::local("Test", email, "hash"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        user(&store, "a@example.com").await;
        let err = store
            .insert_user(NewUser::local("Other", "a@example.com", "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_approved_contact_details_stay_unique() {
        let store = MemoryStore::new();
        let first = user(&store, "a@example.com").await;
        let second = user(&store, "b@example.com").await;
        let d1 = store
            .insert_doctor(NewDoctor { user_id: first.id, fields: fields("dr@example.com", "555") })
            .await
            .unwrap();
        let d2 = store
            .insert_doctor(NewDoctor { user_id: second.id, fields: fields("other@example.com", "555") })
            .await
            .unwrap();

        store.update_doctor_status(d1.id, DoctorStatus::Approved).await.unwrap();
        let err = store
            .update_doctor_status(d2.id, DoctorStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        // Pending duplicates are fine, only approval collides.
        let rejected = store
            .update_doctor_status(d2.id, DoctorStatus::Rejected)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rejected.status, DoctorStatus::Rejected);
    }

    #[tokio::test]
    async fn test_doctor_flag_follows_profile_status() {
        let store = MemoryStore::new();
        let owner = user(&store, "d@example.com").await;
        let doctor = store
            .insert_doctor(NewDoctor { user_id: owner.id, fields: fields("dr@example.com", "555") })
            .await
            .unwrap();

        store.update_doctor_status(doctor.id, DoctorStatus::Approved).await.unwrap();
        assert!(store.find_user(owner.id).await.unwrap().unwrap().is_doctor);
        store.update_doctor_status(doctor.id, DoctorStatus::Rejected).await.unwrap();
        assert!(!store.find_user(owner.id).await.unwrap().unwrap().is_doctor);

        store.update_doctor_status(doctor.id, DoctorStatus::Approved).await.unwrap();
        store.delete_doctor(doctor.id).await.unwrap().unwrap();
        assert!(!store.find_user(owner.id).await.unwrap().unwrap().is_doctor);
    }

    #[tokio::test]
    async fn test_concurrent_block_toggles_alternate() {
        let store = Arc::new(MemoryStore::new());
        let target = user(&store, "t@example.com").await.id;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.toggle_user_blocked(target).await.unwrap().unwrap().is_blocked })
            })
            .collect();
        let mut blocked = 0;
        for handle in handles {
            if handle.await.unwrap() {
                blocked += 1;
            }
        }
        assert_eq!(blocked, 2);
        assert!(!store.find_user(target).await.unwrap().unwrap().is_blocked);
    }

    #[tokio::test]
    async fn test_concurrent_bookings_take_slot_once() {
        let store = Arc::new(MemoryStore::new());
        let mut patients = Vec::new();
        for i in 0..8 {
            patients.push(user(&store, &format!("p{}@example.com", i)).await);
        }

        let handles: Vec<_> = patients
            .iter()
            .map(|p| {
                let store = store.clone();
                let request = NewAppointment { slot: slot(42), user_id: p.id, reason: "checkup".to_string() };
                tokio::spawn(async move { store.insert_appointment(request).await.unwrap() })
            })
            .collect();

        let mut booked = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                booked += 1;
            }
        }
        assert_eq!(booked, 1);
    }

    #[tokio::test]
    async fn test_cancelled_appointment_releases_slot() {
        let store = MemoryStore::new();
        let patient = user(&store, "p@example.com").await;
        let request = NewAppointment { slot: slot(7), user_id: patient.id, reason: "flu".to_string() };
        let first = store.insert_appointment(request.clone()).await.unwrap().unwrap();
        assert!(store.insert_appointment(request.clone()).await.unwrap().is_none());

        // Stale compare-and-set is refused.
        assert!(store
            .transition_appointment(first.id, AppointmentStatus::Confirmed, AppointmentStatus::Cancelled)
            .await
            .unwrap()
            .is_none());
        store
            .transition_appointment(first.id, AppointmentStatus::Pending, AppointmentStatus::Cancelled)
            .await
            .unwrap()
            .unwrap();

        assert!(store.find_slot_holder(&slot(7)).await.unwrap().is_none());
        assert!(store.insert_appointment(request).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_notification_partitions() {
        let store = MemoryStore::new();
        let owner = user(&store, "n@example.com").await;
        for i in 0..5 {
            let note = Notification {
                kind: "test".to_string(),
                message: format!("message {}", i),
                data: Default::default(),
                on_click_path: None,
            };
            store.append_notification(owner.id, &note).await.unwrap();
        }

        let newest = store.notifications(owner.id, false, 3).await.unwrap();
        let messages: Vec<_> = newest.iter().map(|n| n.notification.message.as_str()).collect();
        assert_eq!(messages, ["message 2", "message 3", "message 4"]);

        assert_eq!(store.count_notifications(owner.id, false).await.unwrap(), 5);
        assert_eq!(store.mark_notifications_seen(owner.id).await.unwrap(), 5);
        assert_eq!(store.count_notifications(owner.id, false).await.unwrap(), 0);
        assert!(store.notifications(owner.id, false, 10).await.unwrap().is_empty());
        assert_eq!(store.notifications(owner.id, true, 10).await.unwrap().len(), 5);

        assert_eq!(store.delete_seen_notifications(owner.id).await.unwrap(), 5);
        assert!(store.notifications(owner.id, true, 10).await.unwrap().is_empty());
    }
}
