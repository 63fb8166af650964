//! Attendance decision engine.
//!
//! Turns an already-resolved identity `(employee_id, confidence, timestamp)`
//! into a clock-in or clock-out on that employee's record for the local
//! calendar date. Each `(employee_id, calendar_date)` moves forward through
//! `NoRecord -> ClockedIn -> ClockedOut` only, and every read-check-write runs
//! under that key's lock.

pub mod error;
pub mod locks;
pub mod policy;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::model::attendance::{AttendanceKey, AttendanceRecord, DayPhase, EventKind, EventOutcome};
use crate::model::employee::Employee;
use crate::notify::Notifier;
use crate::store::{AttendanceStore, EmployeeDirectory, StoreError};

pub use error::AttendanceError;
use locks::KeyLocks;
pub use policy::AttendancePolicy;

const LOCK_IDLE: StdDuration = StdDuration::from_secs(15 * 60);

/// What an event will do to the stored record, decided before any write.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Decision {
    ClockIn { record: AttendanceRecord, minutes_late: i64 },
    ClockOut { record: AttendanceRecord },
}

pub struct AttendanceEngine {
    policy: AttendancePolicy,
    directory: Arc<dyn EmployeeDirectory>,
    store: Arc<dyn AttendanceStore>,
    notifier: Arc<dyn Notifier>,
    locks: KeyLocks,
}

impl AttendanceEngine {
    pub fn new(
        policy: AttendancePolicy,
        directory: Arc<dyn EmployeeDirectory>,
        store: Arc<dyn AttendanceStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            policy,
            directory,
            store,
            notifier,
            locks: KeyLocks::new(LOCK_IDLE),
        }
    }

    pub fn policy(&self) -> &AttendancePolicy {
        &self.policy
    }

    /// Applies one recognized event.
    #[instrument(name = "record_event", skip(self), fields(date))]
    pub async fn record_event(
        &self,
        employee_id: u64,
        timestamp: DateTime<Utc>,
        confidence: f64,
    ) -> Result<EventOutcome, AttendanceError> {
        self.check_confidence(confidence)?;
        let employee = self.active_employee(employee_id).await?;

        let key = AttendanceKey::new(employee_id, self.policy.calendar_date(timestamp));
        tracing::Span::current().record("date", tracing::field::display(key.calendar_date));

        let outcome = {
            let _guard = self.locks.lock(key).await;
            self.apply(key, timestamp).await?
        };

        info!(
            event = %outcome.kind,
            status = %outcome.status(),
            minutes_late = outcome.minutes_late,
            "attendance event recorded"
        );
        self.dispatch(&employee, &outcome).await;

        Ok(outcome)
    }

    /// Returns every active employee without an attendance record on `date`
    /// and stores an absence marker for each of them. Callers pass only
    /// fully elapsed dates.
    #[instrument(name = "mark_absentees", skip(self))]
    pub async fn mark_absentees(&self, date: NaiveDate) -> Result<Vec<u64>, AttendanceError> {
        let attended = self.store.employees_with_records(date).await?;

        let mut absent: Vec<u64> = self
            .directory
            .active_employees(None)
            .await?
            .into_iter()
            .map(|employee| employee.id)
            .filter(|id| !attended.contains(id))
            .collect();
        absent.sort_unstable();
        absent.dedup();

        let created = self.store.insert_absence_markers(date, &absent).await?;
        info!(absent = absent.len(), new_markers = created, "absentees marked");

        Ok(absent)
    }

    fn check_confidence(&self, confidence: f64) -> Result<(), AttendanceError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(AttendanceError::InvalidConfidence(confidence));
        }
        if confidence < self.policy.recognition_threshold {
            debug!(confidence, threshold = self.policy.recognition_threshold, "match rejected");
            return Err(AttendanceError::LowConfidenceMatch {
                confidence,
                threshold: self.policy.recognition_threshold,
            });
        }
        Ok(())
    }

    async fn active_employee(&self, employee_id: u64) -> Result<Employee, AttendanceError> {
        self.directory
            .find_employee(employee_id)
            .await?
            .filter(|employee| employee.is_active)
            .ok_or(AttendanceError::UnknownOrInactiveEmployee { employee_id })
    }

    /// Read-check-write for one key. Must be called with the key locked.
    async fn apply(&self, key: AttendanceKey, timestamp: DateTime<Utc>) -> Result<EventOutcome, AttendanceError> {
        let existing = self.store.find_record(&key).await?;
        let decision = decide(&self.policy, key, existing.as_ref(), timestamp)?;
        if let Some(outcome) = self.commit(&key, decision).await? {
            return Ok(outcome);
        }

        // Another process wrote this key between our read and write. Decide
        // once more against what it left behind.
        warn!(%key, "concurrent write detected, re-reading record");
        let existing = self.store.find_record(&key).await?;
        let decision = decide(&self.policy, key, existing.as_ref(), timestamp)?;
        self.commit(&key, decision)
            .await?
            .ok_or(AttendanceError::Store(StoreError::Conflict(key)))
    }

    async fn commit(&self, key: &AttendanceKey, decision: Decision) -> Result<Option<EventOutcome>, AttendanceError> {
        match decision {
            Decision::ClockIn { record, minutes_late } => {
                if !self.store.insert_clock_in(&record).await? {
                    return Ok(None);
                }
                Ok(Some(EventOutcome {
                    kind: EventKind::ClockIn,
                    record,
                    minutes_late,
                }))
            }
            Decision::ClockOut { record } => {
                let Some(clock_out) = record.clock_out_time else {
                    return Ok(None);
                };
                if !self.store.set_clock_out(key, clock_out).await? {
                    return Ok(None);
                }
                Ok(Some(EventOutcome {
                    kind: EventKind::ClockOut,
                    record,
                    minutes_late: 0,
                }))
            }
        }
    }

    async fn dispatch(&self, employee: &Employee, outcome: &EventOutcome) {
        if let Err(e) = self.notifier.notify(employee, outcome).await {
            warn!(error = %e, employee_id = employee.id, "attendance notification failed");
        }
    }
}

/// Pure decision for one event against the current record of its key.
fn decide(
    policy: &AttendancePolicy,
    key: AttendanceKey,
    existing: Option<&AttendanceRecord>,
    timestamp: DateTime<Utc>,
) -> Result<Decision, AttendanceError> {
    let Some(record) = existing else {
        let arrival = policy.classify_arrival(timestamp);
        if arrival.beyond_grace {
            debug!(minutes_late = arrival.minutes_late, "arrival beyond grace window");
        }
        return Ok(Decision::ClockIn {
            record: AttendanceRecord::clock_in(key, timestamp, arrival.status),
            minutes_late: arrival.minutes_late,
        });
    };

    if record.phase() == DayPhase::ClockedOut {
        return Err(AttendanceError::AlreadyCompletedToday {
            employee_id: key.employee_id,
            date: key.calendar_date,
        });
    }

    if timestamp < record.clock_in_time {
        return Err(AttendanceError::OutOfOrderEvent {
            employee_id: key.employee_id,
            timestamp,
            clock_in: record.clock_in_time,
        });
    }

    let elapsed = timestamp - record.clock_in_time;
    if elapsed < policy.min_clockout_interval || elapsed.is_zero() {
        return Err(AttendanceError::ClockOutTooSoon {
            employee_id: key.employee_id,
            elapsed,
            required: policy.min_clockout_interval,
        });
    }

    let mut closed = record.clone();
    closed.clock_out_time = Some(timestamp);
    Ok(Decision::ClockOut { record: closed })
}
