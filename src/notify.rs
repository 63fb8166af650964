//! Outbound attendance notifications.

use async_trait::async_trait;
use chrono::FixedOffset;
use thiserror::Error;
use tracing::info;

use crate::model::attendance::{EventKind, EventOutcome, as_hours};
use crate::model::employee::Employee;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// Receives every successfully recorded attendance event.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, employee: &Employee, outcome: &EventOutcome) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Builds the employee-facing message for an event. Times are shown in the
/// deployment timezone.
pub fn render(employee: &Employee, outcome: &EventOutcome, timezone: FixedOffset) -> Notification {
    let record = &outcome.record;
    let date = record.calendar_date.format("%Y-%m-%d");

    let mut body = format!(
        "Dear {},\n\nYour attendance has been recorded for {}.\n\nStatus: {}\nTime In: {}",
        employee.name,
        date,
        record.status,
        record.clock_in_time.with_timezone(&timezone).format("%H:%M:%S"),
    );

    if let (EventKind::ClockOut, Some(out), Some(worked)) =
        (outcome.kind, record.clock_out_time, record.hours_worked())
    {
        body.push_str(&format!(
            "\nTime Out: {}\nHours Worked: {:.2}",
            out.with_timezone(&timezone).format("%H:%M:%S"),
            as_hours(worked),
        ));
    }
    body.push_str("\n\nThank you for using our attendance system.");

    Notification {
        recipient: employee.email.clone(),
        subject: format!("Attendance Record - {date}"),
        body,
    }
}

/// Emits rendered notifications as structured log events. Mail delivery is
/// left to whatever consumes the log stream; employees without an email
/// address are refused.
pub struct TracingNotifier {
    timezone: FixedOffset,
}

impl TracingNotifier {
    pub fn new(timezone: FixedOffset) -> Self {
        Self { timezone }
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, employee: &Employee, outcome: &EventOutcome) -> Result<(), NotifyError> {
        let notification = render(employee, outcome, self.timezone);
        if !notification.recipient.contains('@') {
            return Err(NotifyError::Delivery {
                recipient: notification.recipient,
                reason: "employee has no usable email address".into(),
            });
        }
        info!(
            target: "attendance_notification",
            recipient = %notification.recipient,
            subject = %notification.subject,
            body = %notification.body,
            "attendance notification"
        );
        Ok(())
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(u64, EventKind)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(u64, EventKind)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, employee: &Employee, outcome: &EventOutcome) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((employee.id, outcome.kind));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::{AttendanceKey, AttendanceRecord, AttendanceStatus};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn employee() -> Employee {
        Employee {
            id: 9,
            employee_code: "EMP-009".into(),
            name: "Nadia".into(),
            email: "nadia@company.test".into(),
            department: None,
            is_active: true,
        }
    }

    fn clock_in_outcome() -> EventOutcome {
        let key = AttendanceKey::new(9, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        EventOutcome {
            kind: EventKind::ClockIn,
            record: AttendanceRecord::clock_in(
                key,
                Utc.with_ymd_and_hms(2026, 3, 2, 7, 15, 0).unwrap(),
                AttendanceStatus::Late,
            ),
            minutes_late: 15,
        }
    }

    #[test]
    fn clock_in_message_shows_local_time_in() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let n = render(&employee(), &clock_in_outcome(), tz);

        assert_eq!(n.recipient, "nadia@company.test");
        assert_eq!(n.subject, "Attendance Record - 2026-03-02");
        assert!(n.body.contains("Status: late"));
        assert!(n.body.contains("Time In: 09:15:00"));
        assert!(!n.body.contains("Time Out"));
    }

    #[test]
    fn clock_out_message_adds_hours_worked() {
        let mut outcome = clock_in_outcome();
        outcome.kind = EventKind::ClockOut;
        outcome.record.clock_out_time = Some(Utc.with_ymd_and_hms(2026, 3, 2, 15, 45, 0).unwrap());

        let n = render(&employee(), &outcome, FixedOffset::east_opt(0).unwrap());
        assert!(n.body.contains("Time Out: 15:45:00"));
        assert!(n.body.contains("Hours Worked: 8.50"));
    }

    #[actix_web::test]
    async fn tracing_notifier_refuses_missing_recipients() {
        let notifier = TracingNotifier::new(FixedOffset::east_opt(0).unwrap());
        assert!(notifier.notify(&employee(), &clock_in_outcome()).await.is_ok());

        let mut nameless = employee();
        nameless.email = String::new();
        let err = notifier.notify(&nameless, &clock_in_outcome()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Delivery { ref recipient, .. } if recipient.is_empty()));
    }
}
