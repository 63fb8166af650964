//! Read-only attendance reporting.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

use crate::model::attendance::{AttendanceRecord, AttendanceStatus, as_hours};
use crate::store::{AttendanceStore, EmployeeDirectory, StoreError};

const NO_DEPARTMENT: &str = "N/A";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inclusive date range, optionally narrowed to one department.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct ReportFilter {
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-03-31", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = "Engineering")]
    pub department: Option<String>,
}

impl ReportFilter {
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.start_date > self.end_date {
            return Err(ReportError::InvalidRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        Ok(())
    }

    pub fn total_days(&self) -> u64 {
        (self.end_date - self.start_date).num_days().max(0) as u64 + 1
    }
}

/// One attendance record joined with the employee fields reports show.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub record: AttendanceRecord,
    pub employee_name: String,
    pub department: Option<String>,
}

impl ReportRow {
    pub fn new(record: AttendanceRecord, employee_name: String, department: Option<String>) -> Self {
        Self {
            record,
            employee_name,
            department,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportRowResponse {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "Engineering")]
    pub department: String,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub time_in: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub time_out: Option<DateTime<Utc>>,
    pub status: AttendanceStatus,
    #[schema(example = 8.25)]
    pub hours_worked: Option<f64>,
}

impl From<&ReportRow> for ReportRowResponse {
    fn from(row: &ReportRow) -> Self {
        Self {
            employee_id: row.record.employee_id,
            employee_name: row.employee_name.clone(),
            department: row.department.clone().unwrap_or_else(|| NO_DEPARTMENT.to_string()),
            date: row.record.calendar_date,
            time_in: row.record.clock_in_time,
            time_out: row.record.clock_out_time,
            status: row.record.status,
            hours_worked: row.record.hours_worked().map(as_hours),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReportSummary {
    pub total_days: u64,
    pub total_employees: u64,
    pub total_attendance: u64,
    pub present_count: u64,
    pub late_count: u64,
    pub absent_count: u64,
    pub avg_hours: f64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepartmentStats {
    #[schema(example = "Engineering")]
    pub name: String,
    pub total: u64,
    pub present: u64,
    pub late: u64,
    pub attendance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TodaySnapshot {
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub total_employees: u64,
    pub present_today: u64,
    pub late_today: u64,
    pub absent_today: u64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn count_status(rows: &[ReportRow], status: AttendanceStatus) -> u64 {
    rows.iter().filter(|r| r.record.status == status).count() as u64
}

pub fn summarize(rows: &[ReportRow], active_employees: u64, filter: &ReportFilter) -> ReportSummary {
    let total_days = filter.total_days();
    let total_attendance = rows.len() as u64;
    let employee_days = active_employees * total_days;

    let completed: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.record.hours_worked())
        .map(|d| d.num_seconds() as f64 / 3600.0)
        .collect();
    let avg_hours = if completed.is_empty() {
        0.0
    } else {
        completed.iter().sum::<f64>() / completed.len() as f64
    };

    let attendance_rate = if employee_days > 0 {
        total_attendance as f64 / employee_days as f64 * 100.0
    } else {
        0.0
    };

    ReportSummary {
        total_days,
        total_employees: active_employees,
        total_attendance,
        present_count: count_status(rows, AttendanceStatus::Present),
        late_count: count_status(rows, AttendanceStatus::Late),
        absent_count: employee_days.saturating_sub(total_attendance),
        avg_hours: round2(avg_hours),
        attendance_rate: round2(attendance_rate),
    }
}

pub fn department_breakdown(rows: &[ReportRow]) -> Vec<DepartmentStats> {
    let mut by_department: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();
    for row in rows {
        let name = row.department.clone().unwrap_or_else(|| NO_DEPARTMENT.to_string());
        let entry = by_department.entry(name).or_default();
        entry.0 += 1;
        match row.record.status {
            AttendanceStatus::Present => entry.1 += 1,
            AttendanceStatus::Late => entry.2 += 1,
            AttendanceStatus::Absent => {}
        }
    }

    by_department
        .into_iter()
        .map(|(name, (total, present, late))| DepartmentStats {
            name,
            total,
            present,
            late,
            attendance_rate: if total > 0 {
                round2(present as f64 / total as f64 * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

/// Read-only view over the attendance store for dashboards and reports.
#[derive(Clone)]
pub struct ReportingReader {
    directory: Arc<dyn EmployeeDirectory>,
    store: Arc<dyn AttendanceStore>,
}

impl ReportingReader {
    pub fn new(directory: Arc<dyn EmployeeDirectory>, store: Arc<dyn AttendanceStore>) -> Self {
        Self { directory, store }
    }

    pub async fn records(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>, ReportError> {
        filter.validate()?;
        Ok(self.store.list_records(filter).await?)
    }

    pub async fn summary(
        &self,
        filter: &ReportFilter,
    ) -> Result<(ReportSummary, Vec<DepartmentStats>), ReportError> {
        let rows = self.records(filter).await?;
        let employees = self
            .directory
            .active_employees(filter.department.as_deref())
            .await?
            .len() as u64;
        Ok((summarize(&rows, employees, filter), department_breakdown(&rows)))
    }

    pub async fn today(&self, date: NaiveDate) -> Result<TodaySnapshot, ReportError> {
        let filter = ReportFilter {
            start_date: date,
            end_date: date,
            department: None,
        };
        let rows = self.store.list_records(&filter).await?;
        let total_employees = self.directory.active_employees(None).await?.len() as u64;
        let attended: HashSet<u64> = rows.iter().map(|r| r.record.employee_id).collect();

        Ok(TodaySnapshot {
            date,
            total_employees,
            present_today: count_status(&rows, AttendanceStatus::Present),
            late_today: count_status(&rows, AttendanceStatus::Late),
            absent_today: total_employees.saturating_sub(attended.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::AttendanceKey;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn row(employee_id: u64, d: u32, status: AttendanceStatus, worked_minutes: Option<i64>, dept: Option<&str>) -> ReportRow {
        let clock_in = Utc.with_ymd_and_hms(2026, 3, d, 9, 0, 0).unwrap();
        let mut record = AttendanceRecord::clock_in(AttendanceKey::new(employee_id, date(d)), clock_in, status);
        record.clock_out_time = worked_minutes.map(|m| clock_in + Duration::minutes(m));
        ReportRow::new(record, format!("Employee {employee_id}"), dept.map(str::to_string))
    }

    fn filter(start: u32, end: u32) -> ReportFilter {
        ReportFilter {
            start_date: date(start),
            end_date: date(end),
            department: None,
        }
    }

    #[test]
    fn summary_counts_days_inclusively() {
        let rows = vec![
            row(1, 2, AttendanceStatus::Present, Some(480), Some("Ops")),
            row(2, 2, AttendanceStatus::Late, Some(420), Some("Ops")),
            row(1, 3, AttendanceStatus::Present, None, Some("Ops")),
        ];
        let summary = summarize(&rows, 2, &filter(2, 3));

        assert_eq!(summary.total_days, 2);
        assert_eq!(summary.total_employees, 2);
        assert_eq!(summary.total_attendance, 3);
        assert_eq!(summary.present_count, 2);
        assert_eq!(summary.late_count, 1);
        assert_eq!(summary.absent_count, 1);
        assert_eq!(summary.avg_hours, 7.5);
        assert_eq!(summary.attendance_rate, 75.0);
    }

    #[test]
    fn summary_of_empty_roster_is_zeroed() {
        let summary = summarize(&[], 0, &filter(1, 1));
        assert_eq!(summary.absent_count, 0);
        assert_eq!(summary.attendance_rate, 0.0);
        assert_eq!(summary.avg_hours, 0.0);
    }

    #[test]
    fn departments_are_grouped_and_sorted() {
        let rows = vec![
            row(1, 2, AttendanceStatus::Present, None, Some("Sales")),
            row(2, 2, AttendanceStatus::Late, None, Some("Sales")),
            row(3, 2, AttendanceStatus::Present, None, None),
            row(4, 2, AttendanceStatus::Present, None, Some("Engineering")),
        ];
        let stats = department_breakdown(&rows);
        let names: Vec<&str> = stats.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Engineering", "N/A", "Sales"]);

        let sales = &stats[2];
        assert_eq!((sales.total, sales.present, sales.late), (2, 1, 1));
        assert_eq!(sales.attendance_rate, 50.0);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(matches!(filter(5, 1).validate(), Err(ReportError::InvalidRange { .. })));
    }

    #[actix_web::test]
    async fn reader_filters_by_department_and_range() {
        let store = Arc::new(MemoryStore::new());
        store.add_employee(1, "Ann", Some("Sales"), true);
        store.add_employee(2, "Bob", Some("Ops"), true);
        store.put_record(row(1, 2, AttendanceStatus::Present, Some(60), None).record);
        store.put_record(row(2, 2, AttendanceStatus::Late, None, None).record);
        store.put_record(row(1, 9, AttendanceStatus::Late, None, None).record);
        let reader = ReportingReader::new(store.clone(), store);

        let sales = ReportFilter {
            department: Some("Sales".into()),
            ..filter(1, 3)
        };
        let rows = reader.records(&sales).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].employee_name, "Ann");
        assert_eq!(ReportRowResponse::from(&rows[0]).hours_worked, Some(1.0));

        let (summary, departments) = reader.summary(&sales).await.unwrap();
        assert_eq!(summary.total_employees, 1);
        assert_eq!(summary.absent_count, 2);
        assert_eq!(departments.len(), 1);
    }

    #[actix_web::test]
    async fn today_snapshot_counts_absent_employees() {
        let store = Arc::new(MemoryStore::new());
        store.add_employee(1, "Ann", None, true);
        store.add_employee(2, "Bob", None, true);
        store.add_employee(3, "Cid", None, true);
        store.add_employee(4, "Dee", None, false);
        store.put_record(row(1, 2, AttendanceStatus::Present, None, None).record);
        store.put_record(row(2, 2, AttendanceStatus::Late, None, None).record);
        let reader = ReportingReader::new(store.clone(), store);

        let snapshot = reader.today(date(2)).await.unwrap();
        assert_eq!(snapshot.total_employees, 3);
        assert_eq!(snapshot.present_today, 1);
        assert_eq!(snapshot.late_today, 1);
        assert_eq!(snapshot.absent_today, 1);
    }
}
