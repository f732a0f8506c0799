use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClinicError;
use crate::slot::hhmm;

pub type UserId = i64;
pub type DoctorId = i64;
pub type AppointmentId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_doctor: bool,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub external_id: Option<String>,
    pub picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Capability required by an operation. Admin satisfies every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        if self.is_admin {
            return true;
        }
        match role {
            Role::Patient => true,
            Role::Doctor => self.is_doctor,
            Role::Admin => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub picture: Option<String>,
    pub is_verified: bool,
    pub is_admin: bool,
}

impl NewUser {
    pub fn local(name: impl Into<String>, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: Some(password_hash.into()),
            external_id: None,
            picture: None,
            is_verified: false,
            is_admin: false,
        }
    }

    /// Accounts asserted by the external identity provider are pre-verified
    /// and carry no local password.
    pub fn external(
        name: impl Into<String>,
        email: impl Into<String>,
        external_id: impl Into<String>,
        picture: Option<String>,
    ) -> Self {
        NewUser {
            name: name.into(),
            email: email.into(),
            password_hash: None,
            external_id: Some(external_id.into()),
            picture,
            is_verified: true,
            is_admin: false,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.password_hash.is_some() || self.external_id.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorStatus {
    Pending,
    Approved,
    Rejected,
}

impl DoctorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorStatus::Pending => "pending",
            DoctorStatus::Approved => "approved",
            DoctorStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoctorStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(DoctorStatus::Pending),
            "approved" => Ok(DoctorStatus::Approved),
            "rejected" => Ok(DoctorStatus::Rejected),
            other => Err(ClinicError::validation(format!("Unknown doctor status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ClinicError> {
        if start >= end {
            return Err(ClinicError::validation("Working hours must start before they end"));
        }
        Ok(WorkingHours { start, end })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Editable part of a doctor profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorFields {
    pub first_name: Option<String>,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub website: Option<String>,
    pub address: String,
    pub specialization: String,
    pub experience_years: i32,
    pub fee_per_consultation: i64,
    pub working_hours: WorkingHours,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub id: DoctorId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: DoctorFields,
    pub status: DoctorStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorProfile {
    pub fn full_name(&self) -> String {
        match self.fields.first_name.as_deref().map(str::trim) {
            Some(first) if !first.is_empty() => format!("{} {}", first, self.fields.last_name),
            _ => self.fields.last_name.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("Dr. {}", self.full_name())
    }

    pub fn is_approved(&self) -> bool {
        self.status == DoctorStatus::Approved
    }
}

#[derive(Debug, Clone)]
pub struct NewDoctor {
    pub user_id: UserId,
    pub fields: DoctorFields,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorFilter {
    pub status: Option<DoctorStatus>,
    pub specialization: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    /// Every status except cancelled keeps its slot occupied.
    pub fn occupies_slot(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            other => Err(ClinicError::validation(format!("Unknown appointment status: {}", other))),
        }
    }
}

/// One bookable window: (doctor, calendar day, time-of-day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub user_id: UserId,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub reason: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> Slot {
        Slot {
            doctor_id: self.doctor_id,
            date: self.date,
            time: self.time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub slot: Slot,
    pub user_id: UserId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<DoctorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_id: Option<AppointmentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub data: NotificationData,
    pub on_click_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredNotification {
    pub id: i64,
    #[serde(flatten)]
    pub notification: Notification,
    pub seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mailbox {
    #[serde(rename = "notifications")]
    pub unread: Vec<StoredNotification>,
    #[serde(rename = "seenNotifications")]
    pub read: Vec<StoredNotification>,
    /// Partition sizes before the mailbox limit is applied.
    #[serde(rename = "totalNotifications")]
    pub unread_total: i64,
    #[serde(rename = "totalSeenNotifications")]
    pub read_total: i64,
}

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page number accepted; larger requests land on this page.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, req: PageRequest) -> Self {
        Page {
            items,
            total,
            page: req.page,
            pages: (total + req.limit - 1) / req.limit,
            limit: req.limit,
        }
    }
}

/// A completed state change together with a warning about any follow-up
/// notification that could not be delivered.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, warning: Option<String>) -> Self {
        Outcome { value, warning }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_state_machine() {
        use AppointmentStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        for terminal in [Cancelled, Completed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Confirmed, Cancelled, Completed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(Completed.occupies_slot());
        assert!(!Cancelled.occupies_slot());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Approved".parse::<DoctorStatus>().unwrap(), DoctorStatus::Approved);
        assert_eq!(" confirmed ".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Confirmed);
        assert!("archived".parse::<DoctorStatus>().is_err());
    }

    #[test]
    fn test_admin_satisfies_every_role() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: None,
            is_admin: false,
            is_doctor: false,
            is_blocked: false,
            is_verified: true,
            external_id: Some("ext-1".to_string()),
            picture: None,
            created_at: now,
            updated_at: now,
        };
        assert!(user.has_role(Role::Patient));
        assert!(!user.has_role(Role::Doctor));
        user.is_doctor = true;
        assert!(user.has_role(Role::Doctor));
        assert!(!user.has_role(Role::Admin));
        user.is_doctor = false;
        user.is_admin = true;
        assert!(user.has_role(Role::Doctor));
        assert!(user.has_role(Role::Admin));
    }

    #[test]
    fn test_page_math() {
        let req = PageRequest::new(Some(0), Some(500));
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, MAX_PAGE_SIZE);
        let req = PageRequest::new(Some(3), Some(10));
        assert_eq!(req.offset(), 20);
        let page: Page<i32> = Page::new(vec![], 21, req);
        assert_eq!(page.pages, 3);
    }

    #[test]
    fn test_huge_page_number_is_clamped() {
        let req = PageRequest::new(Some(i64::MAX), Some(i64::MAX));
        assert_eq!(req.page, MAX_PAGE);
        assert_eq!(req.limit, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);

        let req = PageRequest::new(Some(i64::MIN), None);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_mailbox_uses_partition_names() {
        let json = serde_json::to_value(Mailbox::default()).unwrap();
        assert!(json.get("notifications").is_some());
        assert!(json.get("seenNotifications").is_some());
        assert_eq!(json["totalNotifications"], 0);
    }
}
