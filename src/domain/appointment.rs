use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use time::{format_description::FormatItem, macros::format_description, Date, Time};

use crate::error::ApiError;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const TIME_HM: &[FormatItem<'static>] = format_description!("[hour]:[minute]");
const TIME_HMS: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Lifecycle of a booking:
///
/// ```text
/// PENDING ──► CONFIRMED ──► COMPLETED
///    │            │
///    └──────► CANCELLED ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "PENDING",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    /// Re-setting the current status is allowed so notes can be edited alone.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
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
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(AppointmentStatus::Pending),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            _ => Err(ApiError::InvalidArgument(format!("Unknown status: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PatientSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorSummary {
    pub id: i64,
    pub name: String,
    pub specialization: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Appointment {
    pub id: i64,
    pub patient: PatientSummary,
    pub doctor: DoctorSummary,
    #[serde(serialize_with = "serialize_date")]
    pub date: Date,
    #[serde(serialize_with = "serialize_time")]
    pub time: Time,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub doctor_id: i64,
    pub date: Date,
    pub time: Time,
    pub reason: Option<String>,
}

pub fn parse_date(raw: &str) -> Result<Date, ApiError> {
    Date::parse(raw.trim(), DATE_FORMAT)
        .map_err(|_| ApiError::InvalidArgument(format!("Invalid date {raw:?}, expected YYYY-MM-DD")))
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<Time, ApiError> {
    let raw_trimmed = raw.trim();
    Time::parse(raw_trimmed, TIME_HMS)
        .or_else(|_| Time::parse(raw_trimmed, TIME_HM))
        .map_err(|_| ApiError::InvalidArgument(format!("Invalid time {raw:?}, expected HH:MM")))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_default()
}

pub fn format_time(time: Time) -> String {
    let format = if time.second() == 0 { TIME_HM } else { TIME_HMS };
    time.format(format).unwrap_or_default()
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: Date, today: Date) -> Result<i32, ApiError> {
    if birth > today {
        return Err(ApiError::InvalidArgument("Date of birth is in the future".into()));
    }
    let mut years = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        years -= 1;
    }
    Ok(years)
}

fn serialize_date<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_date(*date))
}

fn serialize_time<S: Serializer>(time: &Time, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_time(*time))
}
