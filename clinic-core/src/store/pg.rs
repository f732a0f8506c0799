use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use std::sync::Arc;

use super::Store;
use crate::db::{DbConnection, DbPool};
use crate::error::{StoreError, StoreResult};
use crate::schema::{clinic_appointments, clinic_doctors, clinic_notifications, clinic_users};
use crate::types::{
    Appointment, AppointmentId, AppointmentStatus, DoctorFields, DoctorFilter, DoctorId,
    DoctorProfile, DoctorStatus, NewAppointment, NewDoctor, NewUser, Notification, PageRequest,
    Slot, StoredNotification, User, UserId, WorkingHours,
};

#[derive(Queryable, Selectable)]
#[diesel(table_name = clinic_users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: Option<String>,
    is_admin: bool,
    is_doctor: bool,
    is_blocked: bool,
    is_verified: bool,
    external_id: Option<String>,
    picture: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            is_admin: row.is_admin,
            is_doctor: row.is_doctor,
            is_blocked: row.is_blocked,
            is_verified: row.is_verified,
            external_id: row.external_id,
            picture: row.picture,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = clinic_doctors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct DoctorRow {
    id: i64,
    user_id: i64,
    first_name: Option<String>,
    last_name: String,
    phone: String,
    email: String,
    website: Option<String>,
    address: String,
    specialization: String,
    experience_years: i32,
    fee_per_consultation: i64,
    work_start: NaiveTime,
    work_end: NaiveTime,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DoctorRow> for DoctorProfile {
    type Error = StoreError;

    fn try_from(row: DoctorRow) -> StoreResult<Self> {
        let status = row
            .status
            .parse::<DoctorStatus>()
            .map_err(|e| StoreError::Corrupt(format!("doctor {}: {}", row.id, e)))?;
        Ok(DoctorProfile {
            id: row.id,
            user_id: row.user_id,
            fields: DoctorFields {
                first_name: row.first_name,
                last_name: row.last_name,
                phone: row.phone,
                email: row.email,
                website: row.website,
                address: row.address,
                specialization: row.specialization,
                experience_years: row.experience_years,
                fee_per_consultation: row.fee_per_consultation,
                working_hours: WorkingHours {
                    start: row.work_start,
                    end: row.work_end,
                },
            },
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = clinic_appointments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct AppointmentRow {
    id: i64,
    doctor_id: i64,
    user_id: i64,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> StoreResult<Self> {
        let status = row
            .status
            .parse::<AppointmentStatus>()
            .map_err(|e| StoreError::Corrupt(format!("appointment {}: {}", row.id, e)))?;
        Ok(Appointment {
            id: row.id,
            doctor_id: row.doctor_id,
            user_id: row.user_id,
            date: row.slot_date,
            time: row.slot_time,
            reason: row.reason,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = clinic_notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct NotificationRow {
    id: i64,
    kind: String,
    message: String,
    data: serde_json::Value,
    on_click_path: Option<String>,
    seen_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for StoredNotification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> StoreResult<Self> {
        let data = serde_json::from_value(row.data)
            .map_err(|e| StoreError::Corrupt(format!("notification {}: {}", row.id, e)))?;
        Ok(StoredNotification {
            id: row.id,
            notification: Notification {
                kind: row.kind,
                message: row.message,
                data,
                on_click_path: row.on_click_path,
            },
            seen_at: row.seen_at,
            created_at: row.created_at,
        })
    }
}

/// Unique-index violations surface as `Conflict`; everything else stays a
/// query error.
fn classify(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => StoreError::Conflict,
        other => StoreError::Query(other),
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn filtered_doctors(filter: &DoctorFilter) -> clinic_doctors::BoxedQuery<'_, Pg> {
    let mut query = clinic_doctors::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(clinic_doctors::status.eq(status.as_str()));
    }
    if let Some(specialization) = filter.specialization.as_deref() {
        query = query.filter(clinic_doctors::specialization.eq(specialization));
    }
    query
}

/// Postgres-backed store. Invariants are held by the partial unique indexes
/// in the embedded migrations.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<DbPool>,
}

impl PgStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<DbConnection> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut conn = self.conn().await?;
        let row: UserRow = diesel::insert_into(clinic_users::table)
            .values((
                clinic_users::name.eq(&user.name),
                clinic_users::email.eq(&user.email),
                clinic_users::password_hash.eq(user.password_hash.as_deref()),
                clinic_users::external_id.eq(user.external_id.as_deref()),
                clinic_users::picture.eq(user.picture.as_deref()),
                clinic_users::is_verified.eq(user.is_verified),
                clinic_users::is_admin.eq(user.is_admin),
            ))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(classify)?;
        Ok(row.into())
    }

    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        let row = clinic_users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        let row = clinic_users::table
            .filter(clinic_users::email.eq(email))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(User::from))
    }

    async fn list_users(&self, page: PageRequest) -> StoreResult<(Vec<User>, i64)> {
        let mut conn = self.conn().await?;
        let total: i64 = clinic_users::table.count().get_result(&mut conn).await?;
        let rows: Vec<UserRow> = clinic_users::table
            .order(clinic_users::id.asc())
            .limit(page.limit)
            .offset(page.offset())
            .select(UserRow::as_select())
            .load(&mut conn)
            .await?;
        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    async fn admin_ids(&self) -> StoreResult<Vec<UserId>> {
        let mut conn = self.conn().await?;
        let ids = clinic_users::table
            .filter(clinic_users::is_admin.eq(true))
            .order(clinic_users::id.asc())
            .select(clinic_users::id)
            .load(&mut conn)
            .await?;
        Ok(ids)
    }

    async fn toggle_user_blocked(&self, id: UserId) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        let row = diesel::update(clinic_users::table.find(id))
            .set((
                clinic_users::is_blocked.eq(diesel::dsl::not(clinic_users::is_blocked)),
                clinic_users::updated_at.eq(Utc::now()),
            ))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(row.map(User::from))
    }

    async fn set_user_admin(&self, id: UserId, is_admin: bool) -> StoreResult<Option<User>> {
        let mut conn = self.conn().await?;
        let row = diesel::update(clinic_users::table.find(id))
            .set((clinic_users::is_admin.eq(is_admin), clinic_users::updated_at.eq(Utc::now())))
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?;
        Ok(row.map(User::from))
    }

    async fn insert_doctor(&self, doctor: NewDoctor) -> StoreResult<DoctorProfile> {
        let mut conn = self.conn().await?;
        let fields = &doctor.fields;
        let row: DoctorRow = diesel::insert_into(clinic_doctors::table)
            .values((
                clinic_doctors::user_id.eq(doctor.user_id),
                clinic_doctors::first_name.eq(fields.first_name.as_deref()),
                clinic_doctors::last_name.eq(&fields.last_name),
                clinic_doctors::phone.eq(&fields.phone),
                clinic_doctors::email.eq(&fields.email),
                clinic_doctors::website.eq(fields.website.as_deref()),
                clinic_doctors::address.eq(&fields.address),
                clinic_doctors::specialization.eq(&fields.specialization),
                clinic_doctors::experience_years.eq(fields.experience_years),
                clinic_doctors::fee_per_consultation.eq(fields.fee_per_consultation),
                clinic_doctors::work_start.eq(fields.working_hours.start),
                clinic_doctors::work_end.eq(fields.working_hours.end),
            ))
            .returning(DoctorRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(classify)?;
        row.try_into()
    }

    async fn find_doctor(&self, id: DoctorId) -> StoreResult<Option<DoctorProfile>> {
        let mut conn = self.conn().await?;
        clinic_doctors::table
            .find(id)
            .select(DoctorRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(DoctorProfile::try_from)
            .transpose()
    }

    async fn find_doctor_by_user(&self, user_id: UserId) -> StoreResult<Option<DoctorProfile>> {
        let mut conn = self.conn().await?;
        clinic_doctors::table
            .filter(clinic_doctors::user_id.eq(user_id))
            .select(DoctorRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(DoctorProfile::try_from)
            .transpose()
    }

    async fn list_doctors(
        &self,
        filter: &DoctorFilter,
        page: PageRequest,
    ) -> StoreResult<(Vec<DoctorProfile>, i64)> {
        let mut conn = self.conn().await?;
        let total: i64 = filtered_doctors(filter).count().get_result(&mut conn).await?;
        let rows: Vec<DoctorRow> = filtered_doctors(filter)
            .order((clinic_doctors::created_at.desc(), clinic_doctors::id.desc()))
            .limit(page.limit)
            .offset(page.offset())
            .select(DoctorRow::as_select())
            .load(&mut conn)
            .await?;
        Ok((convert_all(rows)?, total))
    }

    async fn update_doctor_status(
        &self,
        id: DoctorId,
        status: DoctorStatus,
    ) -> StoreResult<Option<DoctorProfile>> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let row: Option<DoctorRow> = diesel::update(clinic_doctors::table.find(id))
                    .set((
                        clinic_doctors::status.eq(status.as_str()),
                        clinic_doctors::updated_at.eq(Utc::now()),
                    ))
                    .returning(DoctorRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()
                    .map_err(classify)?;
                let Some(row) = row else {
                    return Ok(None);
                };
                diesel::update(clinic_users::table.find(row.user_id))
                    .set((
                        clinic_users::is_doctor.eq(status == DoctorStatus::Approved),
                        clinic_users::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await?;
                DoctorProfile::try_from(row).map(Some)
            }
            .scope_boxed()
        })
        .await
    }

    async fn update_doctor_fields(
        &self,
        id: DoctorId,
        fields: DoctorFields,
    ) -> StoreResult<Option<DoctorProfile>> {
        let mut conn = self.conn().await?;
        diesel::update(clinic_doctors::table.find(id))
            .set((
                clinic_doctors::first_name.eq(fields.first_name.as_deref()),
                clinic_doctors::last_name.eq(&fields.last_name),
                clinic_doctors::phone.eq(&fields.phone),
                clinic_doctors::email.eq(&fields.email),
                clinic_doctors::website.eq(fields.website.as_deref()),
                clinic_doctors::address.eq(&fields.address),
                clinic_doctors::specialization.eq(&fields.specialization),
                clinic_doctors::experience_years.eq(fields.experience_years),
                clinic_doctors::fee_per_consultation.eq(fields.fee_per_consultation),
                clinic_doctors::work_start.eq(fields.working_hours.start),
                clinic_doctors::work_end.eq(fields.working_hours.end),
                clinic_doctors::updated_at.eq(Utc::now()),
            ))
            .returning(DoctorRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(classify)?
            .map(DoctorProfile::try_from)
            .transpose()
    }

    async fn delete_doctor(&self, id: DoctorId) -> StoreResult<Option<DoctorProfile>> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let row: Option<DoctorRow> = diesel::delete(clinic_doctors::table.find(id))
                    .returning(DoctorRow::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?;
                let Some(row) = row else {
                    return Ok(None);
                };
                diesel::update(clinic_users::table.find(row.user_id))
                    .set((
                        clinic_users::is_doctor.eq(false),
                        clinic_users::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await?;
                DoctorProfile::try_from(row).map(Some)
            }
            .scope_boxed()
        })
        .await
    }

    async fn find_slot_holder(&self, slot: &Slot) -> StoreResult<Option<Appointment>> {
        let mut conn = self.conn().await?;
        clinic_appointments::table
            .filter(clinic_appointments::doctor_id.eq(slot.doctor_id))
            .filter(clinic_appointments::slot_date.eq(slot.date))
            .filter(clinic_appointments::slot_time.eq(slot.time))
            .filter(clinic_appointments::status.ne(AppointmentStatus::Cancelled.as_str()))
            .select(AppointmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> StoreResult<Option<Appointment>> {
        let mut conn = self.conn().await?;
        // The partial unique index on the active slot turns a lost race into
        // an empty RETURNING set.
        diesel::insert_into(clinic_appointments::table)
            .values((
                clinic_appointments::doctor_id.eq(appointment.slot.doctor_id),
                clinic_appointments::user_id.eq(appointment.user_id),
                clinic_appointments::slot_date.eq(appointment.slot.date),
                clinic_appointments::slot_time.eq(appointment.slot.time),
                clinic_appointments::reason.eq(&appointment.reason),
            ))
            .on_conflict_do_nothing()
            .returning(AppointmentRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn find_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        let mut conn = self.conn().await?;
        clinic_appointments::table
            .find(id)
            .select(AppointmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn transition_appointment(
        &self,
        id: AppointmentId,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> StoreResult<Option<Appointment>> {
        let mut conn = self.conn().await?;
        diesel::update(
            clinic_appointments::table
                .filter(clinic_appointments::id.eq(id))
                .filter(clinic_appointments::status.eq(from.as_str())),
        )
        .set((
            clinic_appointments::status.eq(to.as_str()),
            clinic_appointments::updated_at.eq(Utc::now()),
        ))
        .returning(AppointmentRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(classify)?
        .map(Appointment::try_from)
        .transpose()
    }

    async fn appointments_for_patient(&self, user_id: UserId) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn().await?;
        let rows: Vec<AppointmentRow> = clinic_appointments::table
            .filter(clinic_appointments::user_id.eq(user_id))
            .order((
                clinic_appointments::slot_date.asc(),
                clinic_appointments::slot_time.asc(),
                clinic_appointments::id.asc(),
            ))
            .select(AppointmentRow::as_select())
            .load(&mut conn)
            .await?;
        convert_all(rows)
    }

    async fn appointments_for_doctor(&self, doctor_id: DoctorId) -> StoreResult<Vec<Appointment>> {
        let mut conn = self.conn().await?;
        let rows: Vec<AppointmentRow> = clinic_appointments::table
            .filter(clinic_appointments::doctor_id.eq(doctor_id))
            .order((
                clinic_appointments::slot_date.asc(),
                clinic_appointments::slot_time.asc(),
                clinic_appointments::id.asc(),
            ))
            .select(AppointmentRow::as_select())
            .load(&mut conn)
            .await?;
        convert_all(rows)
    }

    async fn append_notification(&self, user_id: UserId, notification: &Notification) -> StoreResult<()> {
        let data = serde_json::to_value(&notification.data)
            .map_err(|e| StoreError::Corrupt(format!("notification data: {}", e)))?;
        let mut conn = self.conn().await?;
        diesel::insert_into(clinic_notifications::table)
            .values((
                clinic_notifications::user_id.eq(user_id),
                clinic_notifications::kind.eq(&notification.kind),
                clinic_notifications::message.eq(&notification.message),
                clinic_notifications::data.eq(data),
                clinic_notifications::on_click_path.eq(notification.on_click_path.as_deref()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn notifications(
        &self,
        user_id: UserId,
        seen: bool,
        limit: i64,
    ) -> StoreResult<Vec<StoredNotification>> {
        let mut conn = self.conn().await?;
        let query = clinic_notifications::table
            .filter(clinic_notifications::user_id.eq(user_id))
            .select(NotificationRow::as_select())
            .limit(limit.max(0))
            .into_boxed();
        let query = if seen {
            query
                .filter(clinic_notifications::seen_at.is_not_null())
                .order((clinic_notifications::seen_at.desc(), clinic_notifications::id.desc()))
        } else {
            query
                .filter(clinic_notifications::seen_at.is_null())
                .order(clinic_notifications::id.desc())
        };
        let mut rows: Vec<NotificationRow> = query.load(&mut conn).await?;
        rows.reverse();
        convert_all(rows)
    }

    async fn count_notifications(&self, user_id: UserId, seen: bool) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        let query = clinic_notifications::table
            .filter(clinic_notifications::user_id.eq(user_id))
            .into_boxed();
        let query = if seen {
            query.filter(clinic_notifications::seen_at.is_not_null())
        } else {
            query.filter(clinic_notifications::seen_at.is_null())
        };
        let total: i64 = query.count().get_result(&mut conn).await?;
        Ok(total)
    }

    async fn mark_notifications_seen(&self, user_id: UserId) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        let moved = diesel::update(
            clinic_notifications::table
                .filter(clinic_notifications::user_id.eq(user_id))
                .filter(clinic_notifications::seen_at.is_null()),
        )
        .set(clinic_notifications::seen_at.eq(Some(Utc::now())))
        .execute(&mut conn)
        .await?;
        Ok(moved as u64)
    }

    async fn delete_seen_notifications(&self, user_id: UserId) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        let removed = diesel::delete(
            clinic_notifications::table
                .filter(clinic_notifications::user_id.eq(user_id))
                .filter(clinic_notifications::seen_at.is_not_null()),
        )
        .execute(&mut conn)
        .await?;
        Ok(removed as u64)
    }
}
