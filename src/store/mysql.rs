use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::TryStreamExt;
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};
use tracing::{debug, error, info};

use super::{AttendanceStore, EmployeeDirectory, StoreError};
use crate::model::attendance::{AttendanceKey, AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use crate::report::{ReportFilter, ReportRow};

/// MySQL-backed employee directory and attendance store.
///
/// `attendance_records` carries `UNIQUE (employee_id, calendar_date)`, so a
/// second clock-in for the same key is refused by the database even when it
/// comes from another process. A clock-in and the removal of that day's
/// absence marker commit together.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// MySQL `ER_DUP_ENTRY`. Other integrity errors share SQLSTATE 23000.
const ER_DUP_ENTRY: u16 = 1062;

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .is_some_and(|mysql| mysql.number() == ER_DUP_ENTRY),
        _ => false,
    }
}

#[derive(FromRow)]
struct AttendanceSql {
    employee_id: u64,
    calendar_date: NaiveDate,
    clock_in_time: DateTime<Utc>,
    clock_out_time: Option<DateTime<Utc>>,
    status: String,
}

impl TryFrom<AttendanceSql> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceSql) -> Result<Self, Self::Error> {
        let key = AttendanceKey::new(row.employee_id, row.calendar_date);
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| StoreError::CorruptRow {
            key,
            reason: format!("unknown status {:?}", row.status),
        })?;
        if status == AttendanceStatus::Absent {
            return Err(StoreError::CorruptRow {
                key,
                reason: "attendance rows never carry the absent status".into(),
            });
        }
        if row.clock_out_time.is_some_and(|out| out <= row.clock_in_time) {
            return Err(StoreError::CorruptRow {
                key,
                reason: "clock-out is not after clock-in".into(),
            });
        }

        Ok(AttendanceRecord {
            employee_id: row.employee_id,
            calendar_date: row.calendar_date,
            clock_in_time: row.clock_in_time,
            clock_out_time: row.clock_out_time,
            status,
        })
    }
}

#[derive(FromRow)]
struct ReportSql {
    #[sqlx(flatten)]
    attendance: AttendanceSql,
    employee_name: String,
    department: Option<String>,
}

#[async_trait]
impl EmployeeDirectory for MySqlStore {
    async fn find_employee(&self, employee_id: u64) -> Result<Option<Employee>, StoreError> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, employee_code, name, email, department, is_active
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn active_employees(&self, department: Option<&str>) -> Result<Vec<Employee>, StoreError> {
        let mut query = QueryBuilder::<MySql>::new(
            "SELECT id, employee_code, name, email, department, is_active FROM employees WHERE is_active = TRUE",
        );
        if let Some(department) = department {
            query.push(" AND department = ").push_bind(department);
        }
        query.push(" ORDER BY id");

        let employees = query.build_query_as::<Employee>().fetch_all(&self.pool).await?;
        Ok(employees)
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn find_record(&self, key: &AttendanceKey) -> Result<Option<AttendanceRecord>, StoreError> {
        let row = sqlx::query_as::<_, AttendanceSql>(
            r#"
            SELECT employee_id, calendar_date, clock_in_time, clock_out_time, status
            FROM attendance_records
            WHERE employee_id = ? AND calendar_date = ?
            "#,
        )
        .bind(key.employee_id)
        .bind(key.calendar_date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn insert_clock_in(&self, record: &AttendanceRecord) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO attendance_records (employee_id, calendar_date, clock_in_time, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.calendar_date)
        .bind(record.clock_in_time)
        .bind(record.status.as_ref())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_duplicate_key(&e) => {
                debug!(key = %record.key(), "clock-in lost to an existing row");
                return Ok(false);
            }
            Err(e) => {
                error!(error = %e, key = %record.key(), "clock-in insert failed");
                return Err(e.into());
            }
        }

        // A late clock-in supersedes an absence already marked for the day.
        let cleared = sqlx::query(
            r#"
            DELETE FROM absence_markers
            WHERE employee_id = ?
            AND calendar_date = ?
            "#,
        )
        .bind(record.employee_id)
        .bind(record.calendar_date)
        .execute(&mut *tx)
        .await?;
        if cleared.rows_affected() > 0 {
            info!(key = %record.key(), "absence marker replaced by clock-in");
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn set_clock_out(&self, key: &AttendanceKey, clock_out: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET clock_out_time = ?
            WHERE employee_id = ?
            AND calendar_date = ?
            AND clock_out_time IS NULL
            AND clock_in_time < ?
            "#,
        )
        .bind(clock_out)
        .bind(key.employee_id)
        .bind(key.calendar_date)
        .bind(clock_out)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, %key, "clock-out update failed");
            e
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn employees_with_records(&self, date: NaiveDate) -> Result<HashSet<u64>, StoreError> {
        let mut stream = sqlx::query_as::<_, (u64,)>(
            "SELECT employee_id FROM attendance_records WHERE calendar_date = ?",
        )
        .bind(date)
        .fetch(&self.pool);

        let mut attended = HashSet::new();
        while let Some((employee_id,)) = stream.try_next().await? {
            attended.insert(employee_id);
        }
        Ok(attended)
    }

    async fn insert_absence_markers(&self, date: NaiveDate, employee_ids: &[u64]) -> Result<u64, StoreError> {
        if employee_ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<MySql>::new("INSERT IGNORE INTO absence_markers (employee_id, calendar_date) ");
        query.push_values(employee_ids, |mut row, employee_id| {
            row.push_bind(*employee_id).push_bind(date);
        });

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn list_records(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>, StoreError> {
        let mut query = QueryBuilder::<MySql>::new(
            r#"
            SELECT a.employee_id, a.calendar_date, a.clock_in_time, a.clock_out_time, a.status,
                   e.name AS employee_name, e.department
            FROM attendance_records a
            JOIN employees e ON e.id = a.employee_id
            WHERE a.calendar_date BETWEEN "#,
        );
        query
            .push_bind(filter.start_date)
            .push(" AND ")
            .push_bind(filter.end_date);
        if let Some(department) = &filter.department {
            query.push(" AND e.department = ").push_bind(department.as_str());
        }
        query.push(" ORDER BY a.clock_in_time DESC");

        debug!(sql = %query.sql(), "listing attendance records");

        let rows = query.build_query_as::<ReportSql>().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let record = AttendanceRecord::try_from(row.attendance)?;
                Ok(ReportRow::new(record, row.employee_name, row.department))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(status: &str, out_after_minutes: Option<i64>) -> AttendanceSql {
        let clock_in = Utc.with_ymd_and_hms(2026, 3, 2, 8, 55, 0).unwrap();
        AttendanceSql {
            employee_id: 7,
            calendar_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            clock_in_time: clock_in,
            clock_out_time: out_after_minutes.map(|m| clock_in + chrono::Duration::minutes(m)),
            status: status.to_string(),
        }
    }

    #[test]
    fn valid_rows_convert() {
        let record = AttendanceRecord::try_from(row("late", Some(240))).unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.hours_worked(), Some(chrono::Duration::hours(4)));

        let open = AttendanceRecord::try_from(row("present", None)).unwrap();
        assert_eq!(open.clock_out_time, None);
    }

    #[test]
    fn unreadable_rows_are_reported_as_corrupt() {
        for bad in [row("on_leave", None), row("absent", None), row("present", Some(0)), row("present", Some(-5))] {
            let err = AttendanceRecord::try_from(bad).unwrap_err();
            assert!(matches!(err, StoreError::CorruptRow { key, .. } if key.employee_id == 7), "{err}");
        }
    }

    #[test]
    fn only_database_errors_can_be_duplicate_keys() {
        assert!(!is_duplicate_key(&sqlx::Error::RowNotFound));
        assert!(!is_duplicate_key(&sqlx::Error::PoolTimedOut));
    }
}
