use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;

use crate::store::StoreError;

/// Every way a recognition event or sweep can be refused. None of these
/// leave partial writes behind.
#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("employee {employee_id} is unknown or inactive")]
    UnknownOrInactiveEmployee { employee_id: u64 },

    #[error("match confidence {confidence:.2} is below the required {threshold:.2}")]
    LowConfidenceMatch { confidence: f64, threshold: f64 },

    #[error("confidence {0} is not a score between 0 and 1")]
    InvalidConfidence(f64),

    #[error("event at {timestamp} precedes clock-in at {clock_in} for employee {employee_id}")]
    OutOfOrderEvent {
        employee_id: u64,
        timestamp: DateTime<Utc>,
        clock_in: DateTime<Utc>,
    },

    #[error(
        "cannot clock out yet: {} of {} required minutes elapsed",
        .elapsed.num_minutes(),
        .required.num_minutes()
    )]
    ClockOutTooSoon {
        employee_id: u64,
        elapsed: Duration,
        required: Duration,
    },

    #[error("attendance for employee {employee_id} on {date} is already complete")]
    AlreadyCompletedToday { employee_id: u64, date: NaiveDate },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AttendanceError {
    /// Stable machine-readable name of the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::UnknownOrInactiveEmployee { .. } => "unknown_or_inactive_employee",
            AttendanceError::LowConfidenceMatch { .. } => "low_confidence_match",
            AttendanceError::InvalidConfidence(_) => "invalid_confidence",
            AttendanceError::OutOfOrderEvent { .. } => "out_of_order_event",
            AttendanceError::ClockOutTooSoon { .. } => "clock_out_too_soon",
            AttendanceError::AlreadyCompletedToday { .. } => "already_completed_today",
            AttendanceError::Store(_) => "store_error",
        }
    }
}
