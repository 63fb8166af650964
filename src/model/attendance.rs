use chrono::{DateTime, Duration, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, EnumString};
use utoipa::ToSchema;

/// Day classification attached to an employee's attendance.
///
/// Attendance rows only ever carry `Present` or `Late`. Absence lives in the
/// `absence_markers` written by `mark_absentees` and in report arithmetic;
/// no accepted event or stored row carries `Absent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, StrumDisplay, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, StrumDisplay, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    ClockIn,
    ClockOut,
}

/// Unique identity of a day's attendance for one employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display(fmt = "employee {} on {}", employee_id, calendar_date)]
pub struct AttendanceKey {
    pub employee_id: u64,
    pub calendar_date: NaiveDate,
}

impl AttendanceKey {
    pub fn new(employee_id: u64, calendar_date: NaiveDate) -> Self {
        Self {
            employee_id,
            calendar_date,
        }
    }
}

/// Where a day's record sits in `NoRecord -> ClockedIn -> ClockedOut`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPhase {
    ClockedIn,
    ClockedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub employee_id: u64,
    pub calendar_date: NaiveDate,
    pub clock_in_time: DateTime<Utc>,
    pub clock_out_time: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn clock_in(key: AttendanceKey, at: DateTime<Utc>, status: AttendanceStatus) -> Self {
        Self {
            employee_id: key.employee_id,
            calendar_date: key.calendar_date,
            clock_in_time: at,
            clock_out_time: None,
            status,
        }
    }

    pub fn key(&self) -> AttendanceKey {
        AttendanceKey::new(self.employee_id, self.calendar_date)
    }

    pub fn phase(&self) -> DayPhase {
        match self.clock_out_time {
            Some(_) => DayPhase::ClockedOut,
            None => DayPhase::ClockedIn,
        }
    }

    pub fn hours_worked(&self) -> Option<Duration> {
        self.clock_out_time.map(|out| out - self.clock_in_time)
    }
}

/// Result of an accepted recognition event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventOutcome {
    pub kind: EventKind,
    /// Record state after the event was applied.
    pub record: AttendanceRecord,
    /// Minutes past working-hours start at clock-in; 0 when on time.
    pub minutes_late: i64,
}

impl EventOutcome {
    pub fn status(&self) -> AttendanceStatus {
        self.record.status
    }

    pub fn hours_worked(&self) -> Option<Duration> {
        match self.kind {
            EventKind::ClockIn => None,
            EventKind::ClockOut => self.record.hours_worked(),
        }
    }
}

/// Fractional hours, rounded to two decimals for display and reports.
pub fn as_hours(duration: Duration) -> f64 {
    let hours = duration.num_seconds() as f64 / 3600.0;
    (hours * 100.0).round() / 100.0
}
