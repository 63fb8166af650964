use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::model::attendance::{AttendanceKey, AttendanceRecord};
use crate::model::employee::Employee;
use crate::report::{ReportFilter, ReportRow};

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored attendance for {key} is unreadable: {reason}")]
    CorruptRow { key: AttendanceKey, reason: String },

    #[error("{0} was written concurrently by another writer")]
    Conflict(AttendanceKey),
}

/// Read access to the employee roster.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_employee(&self, employee_id: u64) -> Result<Option<Employee>, StoreError>;

    /// Active employees, optionally restricted to one department.
    async fn active_employees(&self, department: Option<&str>) -> Result<Vec<Employee>, StoreError>;
}

/// Durable attendance state keyed by `(employee_id, calendar_date)`.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_record(&self, key: &AttendanceKey) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Inserts a fresh clock-in and drops any absence marker for the same
    /// key in the same write. Returns `false` if a record for the key already
    /// exists, leaving it untouched.
    async fn insert_clock_in(&self, record: &AttendanceRecord) -> Result<bool, StoreError>;

    /// Sets the clock-out of an open record. Returns `false` if there is no
    /// open record for the key.
    async fn set_clock_out(&self, key: &AttendanceKey, clock_out: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn employees_with_records(&self, date: NaiveDate) -> Result<HashSet<u64>, StoreError>;

    /// Idempotently stores absence markers. Returns how many were new.
    async fn insert_absence_markers(&self, date: NaiveDate, employee_ids: &[u64]) -> Result<u64, StoreError>;

    async fn list_records(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>, StoreError>;
}
