use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use shared_models::error::AppError;
use shared_utils::listing::{Listable, SortValue};

// ==============================================================================
// CLINIC WORKING WINDOW
// ==============================================================================

pub const DAY_START_HOUR: u32 = 9;
pub const DAY_END_HOUR: u32 = 17;
pub const SLOT_GRANULARITY_MINUTES: u32 = 30;
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Bookable hours of the clinic and the step at which start times are offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub day_start: TimeOfDay,
    pub day_end: TimeOfDay,
    pub granularity_minutes: u32,
}

impl Default for WorkingWindow {
    fn default() -> Self {
        Self {
            day_start: TimeOfDay::from_minutes(DAY_START_HOUR * 60),
            day_end: TimeOfDay::from_minutes(DAY_END_HOUR * 60),
            granularity_minutes: SLOT_GRANULARITY_MINUTES,
        }
    }
}

impl WorkingWindow {
    /// Every candidate start time, ignoring duration and bookings.
    pub fn grid(&self) -> impl Iterator<Item = TimeOfDay> {
        (self.day_start.minutes()..self.day_end.minutes())
            .step_by(self.granularity_minutes.max(1) as usize)
            .map(TimeOfDay::from_minutes)
    }
}

// ==============================================================================
// TIME OF DAY
// ==============================================================================

/// Wall-clock time as minutes since midnight. Serialized as zero-padded `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        (hour <= 23 && minute <= 59).then(|| Self(hour * 60 + minute))
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / 60
    }

    pub fn minute(&self) -> u32 {
        self.0 % 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppointmentError::InvalidTime(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse().map_err(|_| invalid())?;
        let minute = minute.parse().map_err(|_| invalid())?;
        TimeOfDay::from_hm(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// APPOINTMENT RECORDS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Other(String),
}

impl AppointmentStatus {
    /// Cancelled and completed appointments no longer occupy the doctor.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::InProgress => "IN_PROGRESS",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
            AppointmentStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for AppointmentStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => AppointmentStatus::Scheduled,
            "CHECKED_IN" => AppointmentStatus::CheckedIn,
            "IN_PROGRESS" => AppointmentStatus::InProgress,
            "COMPLETED" => AppointmentStatus::Completed,
            "CANCELLED" | "CANCELED" => AppointmentStatus::Cancelled,
            "NO_SHOW" => AppointmentStatus::NoShow,
            _ => AppointmentStatus::Other(raw),
        }
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An appointment as returned by the hospital backend. Only
/// `appointmentDateTime` is required; other fields of an unexpected JSON type
/// read as absent instead of rejecting the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub appointment_date_time: String,
    #[serde(default, deserialize_with = "lenient_minutes")]
    pub duration: Option<i64>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub patient_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub doctor_name: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    pub appointment_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
}

impl AppointmentRecord {
    pub fn new(appointment_date_time: &str, duration: Option<i64>, status: AppointmentStatus) -> Self {
        Self {
            id: None,
            appointment_date_time: appointment_date_time.to_string(),
            duration,
            status: Some(status),
            patient_name: None,
            doctor_name: None,
            appointment_type: None,
            notes: None,
        }
    }

    /// Missing status means the appointment was just booked.
    pub fn status(&self) -> AppointmentStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Stored duration, with missing or non-positive values read as the default.
    pub fn duration_minutes(&self) -> u32 {
        normalize_duration(self.duration)
    }
}

/// Positive minute counts pass through; anything else becomes the default.
pub fn normalize_duration(minutes: Option<i64>) -> u32 {
    minutes
        .and_then(|m| u32::try_from(m).ok())
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_DURATION_MINUTES)
}

/// Accepts integers, floats, and numeric strings; other shapes read as absent.
fn lenient_minutes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(minutes_from_value))
}

/// Strings pass through; any other shape reads as absent.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Empty or null status means SCHEDULED; numeric codes are kept as unknown
/// statuses so they still block.
fn lenient_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<AppointmentStatus>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(AppointmentStatus::from(s)),
        Some(Value::Number(n)) => Some(AppointmentStatus::from(n.to_string())),
        _ => None,
    })
}

pub fn minutes_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Listable for AppointmentRecord {
    fn search_fields(&self) -> Vec<&str> {
        [
            self.patient_name.as_deref(),
            self.doctor_name.as_deref(),
            self.appointment_type.as_deref(),
            self.notes.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn filter_value(&self, field: &str) -> Option<&str> {
        match field {
            "status" => Some(self.status.as_ref().map_or("SCHEDULED", |s| s.as_str())),
            "type" => self.appointment_type.as_deref(),
            "doctorName" => self.doctor_name.as_deref(),
            _ => None,
        }
    }

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "appointmentDateTime" | "date" => SortValue::Text(&self.appointment_date_time),
            "patientName" => optional_text(&self.patient_name),
            "doctorName" => optional_text(&self.doctor_name),
            "type" => optional_text(&self.appointment_type),
            "status" => SortValue::Text(self.status.as_ref().map_or("SCHEDULED", |s| s.as_str())),
            "duration" => SortValue::Number(f64::from(self.duration_minutes())),
            _ => SortValue::Missing,
        }
    }
}

fn optional_text(field: &Option<String>) -> SortValue<'_> {
    match field.as_deref() {
        Some(value) => SortValue::Text(value),
        None => SortValue::Missing,
    }
}

// ==============================================================================
// SLOT COMPUTATION
// ==============================================================================

/// Time range held by an appointment, in minutes since midnight, half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingInterval {
    pub start: u32,
    pub end: u32,
    pub status: AppointmentStatus,
}

impl BlockingInterval {
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        start < self.end && end > self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotComputation {
    pub available_slots: Vec<TimeOfDay>,
    pub duration_minutes: u32,
    /// Set when the slots are the default grid substituted for an
    /// unexplained empty result, not a real availability answer.
    pub fallback: bool,
    pub parsed_records: usize,
    pub skipped_records: usize,
    pub active_appointments: usize,
}

impl SlotComputation {
    pub fn contains(&self, time: TimeOfDay) -> bool {
        self.available_slots.contains(&time)
    }
}

// ==============================================================================
// API REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ComputeSlotsRequest {
    pub appointments: Value,
    #[serde(default)]
    pub duration: Option<Value>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment data is not a list: {0}")]
    MalformedCollection(String),

    #[error("Appointment directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Unauthorized access to appointments")]
    Unauthorized,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Invalid appointment date: {0}")]
    InvalidDate(String),

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Time slot {0} is not available")]
    SlotNotAvailable(TimeOfDay),
}

impl AppointmentError {
    /// Message shown on the booking form.
    pub fn user_message(&self) -> String {
        match self {
            AppointmentError::MalformedCollection(_) => {
                "Failed to load doctor appointments. Please try again.".to_string()
            }
            AppointmentError::DirectoryUnavailable(_)
            | AppointmentError::Unauthorized
            | AppointmentError::DoctorNotFound => {
                "Failed to check doctor availability. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::MalformedCollection(_) => AppError::Upstream(err.user_message()),
            AppointmentError::DirectoryUnavailable(_) => AppError::Upstream(err.user_message()),
            AppointmentError::Unauthorized => AppError::Auth(err.to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidDate(_) | AppointmentError::InvalidTime(_) => {
                AppError::BadRequest(err.to_string())
            }
            AppointmentError::SlotNotAvailable(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn time_of_day_round_trips_through_text() {
        let time: TimeOfDay = "09:30".parse().unwrap();
        assert_eq!(time.minutes(), 570);
        assert_eq!(time.to_string(), "09:30");
        assert_eq!(serde_json::to_value(time).unwrap(), json!("09:30"));
    }

    #[test]
    fn time_of_day_rejects_out_of_range() {
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("10:60".parse::<TimeOfDay>().is_err());
        assert!("ten".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn default_window_grid_has_sixteen_starts() {
        let grid: Vec<String> = WorkingWindow::default().grid().map(|t| t.to_string()).collect();
        assert_eq!(grid.len(), 16);
        assert_eq!(grid.first().map(String::as_str), Some("09:00"));
        assert_eq!(grid.last().map(String::as_str), Some("16:30"));
    }

    #[test]
    fn status_parsing_is_case_insensitive_and_keeps_unknowns() {
        assert_eq!(AppointmentStatus::from("cancelled".to_string()), AppointmentStatus::Cancelled);
        assert_eq!(AppointmentStatus::from("Checked_In".to_string()), AppointmentStatus::CheckedIn);
        let other = AppointmentStatus::from("RESCHEDULED".to_string());
        assert_eq!(other, AppointmentStatus::Other("RESCHEDULED".to_string()));
        assert!(other.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
    }

    #[test]
    fn record_decodes_with_optional_fields() {
        let record: AppointmentRecord = serde_json::from_value(json!({
            "id": 12,
            "appointmentDateTime": "2024-03-15T10:00:00",
            "duration": "45",
            "patientName": "Ana Lopez",
            "extra": true
        }))
        .unwrap();

        assert_eq!(record.duration_minutes(), 45);
        assert_eq!(record.status(), AppointmentStatus::Scheduled);
        assert_eq!(record.patient_name.as_deref(), Some("Ana Lopez"));
    }

    #[test]
    fn mistyped_optional_fields_read_as_absent() {
        let record: AppointmentRecord = serde_json::from_value(json!({
            "appointmentDateTime": "2024-03-15T10:00:00",
            "status": 3,
            "notes": 42,
            "patientName": { "first": "Ana" },
            "doctorName": ["Dr. Gray"],
            "type": false
        }))
        .unwrap();

        assert_eq!(record.status(), AppointmentStatus::Other("3".to_string()));
        assert!(record.status().is_active());
        assert!(record.notes.is_none());
        assert!(record.patient_name.is_none());
        assert!(record.doctor_name.is_none());
        assert!(record.appointment_type.is_none());
    }

    #[test]
    fn blank_status_reads_as_scheduled() {
        let record: AppointmentRecord = serde_json::from_value(json!({
            "appointmentDateTime": "2024-03-15T10:00:00",
            "status": ""
        }))
        .unwrap();
        assert_eq!(record.status(), AppointmentStatus::Scheduled);
    }

    #[test]
    fn non_positive_duration_reads_as_default() {
        assert_eq!(normalize_duration(Some(0)), 30);
        assert_eq!(normalize_duration(Some(-15)), 30);
        assert_eq!(normalize_duration(None), 30);
        assert_eq!(normalize_duration(Some(60)), 60);
    }

    #[test]
    fn errors_map_to_http_errors() {
        let app: AppError = AppointmentError::MalformedCollection("object".to_string()).into();
        assert_eq!(app.message(), "Failed to load doctor appointments. Please try again.");

        let app: AppError = AppointmentError::InvalidDate("tomorrow".to_string()).into();
        assert!(matches!(app, AppError::BadRequest(_)));

        let taken = TimeOfDay::from_minutes(600);
        let app: AppError = AppointmentError::SlotNotAvailable(taken).into();
        assert!(matches!(app, AppError::ValidationError(_)));

        let app: AppError = AppointmentError::DoctorNotFound.into();
        assert!(matches!(app, AppError::NotFound(_)));
    }
}
