use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};

use crate::model::attendance::AttendanceStatus;

/// Attendance rules applied by the decision engine.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    /// Minimum recognition confidence accepted as a match.
    pub recognition_threshold: f64,
    pub working_hours_start: NaiveTime,
    pub working_hours_end: NaiveTime,
    /// Grace window after start. Arrivals inside it are still `Late`; the
    /// window only decides whether the arrival is logged as beyond grace.
    pub late_threshold: Duration,
    pub min_clockout_interval: Duration,
    /// Deployment timezone used to bucket events into calendar dates.
    pub timezone: FixedOffset,
}

/// Classification of a clock-in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    pub status: AttendanceStatus,
    pub minutes_late: i64,
    pub beyond_grace: bool,
}

impl AttendancePolicy {
    pub fn calendar_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.timezone).date_naive()
    }

    /// Local date containing `now`; used only at ingestion boundaries.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        self.calendar_date(now)
    }

    pub fn classify_arrival(&self, timestamp: DateTime<Utc>) -> Arrival {
        let local = timestamp.with_timezone(&self.timezone).time();
        if local <= self.working_hours_start {
            return Arrival {
                status: AttendanceStatus::Present,
                minutes_late: 0,
                beyond_grace: false,
            };
        }

        let late_by = local - self.working_hours_start;
        Arrival {
            status: AttendanceStatus::Late,
            minutes_late: late_by.num_minutes(),
            beyond_grace: late_by > self.late_threshold,
        }
    }
}

#[cfg(test)]
impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            recognition_threshold: 0.75,
            working_hours_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            working_hours_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            late_threshold: Duration::minutes(30),
            min_clockout_interval: Duration::minutes(10),
            timezone: FixedOffset::east_opt(0).unwrap(),
        }
    }
}
