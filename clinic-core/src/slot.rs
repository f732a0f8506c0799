//! Normalization of client-supplied dates and times.
//!
//! Clients send dates as `YYYY-MM-DD`, `DD-MM-YYYY` or full RFC 3339
//! timestamps, and times in either 24-hour (`14:30`) or 12-hour
//! (`02:30 PM`) notation. Everything is reduced to a `NaiveDate` and a
//! 24-hour `NaiveTime` before it reaches the store.

use chrono::{DateTime, NaiveDate, NaiveTime};

use crate::error::ClinicError;
use crate::types::WorkingHours;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y"];
const TIME_FORMATS_24H: &[&str] = &["%H:%M", "%H:%M:%S"];
const TIME_FORMATS_12H: &[&str] = &["%I:%M %p", "%I:%M%p", "%I:%M:%S %p"];

pub fn parse_date(input: &str) -> Result<NaiveDate, ClinicError> {
    let input = input.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return Ok(date);
        }
    }
    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.date_naive())
        .map_err(|_| ClinicError::validation(format!("Invalid date: {}", input)))
}

pub fn parse_time(input: &str) -> Result<NaiveTime, ClinicError> {
    let input = input.trim().to_ascii_uppercase();
    let formats = if input.ends_with("AM") || input.ends_with("PM") {
        TIME_FORMATS_12H
    } else {
        TIME_FORMATS_24H
    };
    formats
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&input, format).ok())
        .ok_or_else(|| ClinicError::validation(format!("Invalid time: {}", input)))
}

/// `DD-MM-YYYY`, as shown in notification messages.
pub fn display_date(date: NaiveDate) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// `hh:mm AM`, as shown in notification messages.
pub fn display_time(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

/// Requested time must fall inside the working hours (inclusive) and sit on
/// the slot grid anchored at the start of the working day.
pub fn check_working_hours(
    hours: &WorkingHours,
    time: NaiveTime,
    slot_minutes: u32,
) -> Result<(), ClinicError> {
    if !hours.contains(time) {
        return Err(ClinicError::validation(format!(
            "Selected time is outside doctor's working hours ({} - {})",
            hours.start.format("%H:%M"),
            hours.end.format("%H:%M")
        )));
    }
    let offset = (time - hours.start).num_seconds();
    let step = i64::from(slot_minutes.max(1)) * 60;
    if offset % step != 0 {
        return Err(ClinicError::validation(format!(
            "Appointments start every {} minutes from {}",
            slot_minutes,
            hours.start.format("%H:%M")
        )));
    }
    Ok(())
}

/// Serde adapter writing `HH:MM` and reading any accepted time notation.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(de::Error::custom)
    }
}
