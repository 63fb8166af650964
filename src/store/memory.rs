use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::{AttendanceStore, EmployeeDirectory, StoreError};
use crate::model::attendance::{AttendanceKey, AttendanceRecord};
use crate::model::employee::Employee;
use crate::report::{ReportFilter, ReportRow};

/// In-process store used by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    employees: Mutex<BTreeMap<u64, Employee>>,
    records: Mutex<HashMap<AttendanceKey, AttendanceRecord>>,
    markers: Mutex<HashSet<AttendanceKey>>,
    /// Record planted by the next `insert_clock_in`, which then reports a lost race.
    racing_writer: Mutex<Option<AttendanceRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_employee(&self, id: u64, name: &str, department: Option<&str>, is_active: bool) {
        let employee = Employee {
            id,
            employee_code: format!("EMP-{id:03}"),
            name: name.to_string(),
            email: format!("{}@company.test", name.to_lowercase()),
            department: department.map(str::to_string),
            is_active,
        };
        self.employees.lock().unwrap().insert(id, employee);
    }

    pub fn put_record(&self, record: AttendanceRecord) {
        self.records.lock().unwrap().insert(record.key(), record);
    }

    pub fn record(&self, employee_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&AttendanceKey::new(employee_id, date))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.lock().unwrap().len()
    }

    pub fn has_marker(&self, employee_id: u64, date: NaiveDate) -> bool {
        self.markers
            .lock()
            .unwrap()
            .contains(&AttendanceKey::new(employee_id, date))
    }

    pub fn fail_next_insert_with(&self, winner: AttendanceRecord) {
        *self.racing_writer.lock().unwrap() = Some(winner);
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryStore {
    async fn find_employee(&self, employee_id: u64) -> Result<Option<Employee>, StoreError> {
        Ok(self.employees.lock().unwrap().get(&employee_id).cloned())
    }

    async fn active_employees(&self, department: Option<&str>) -> Result<Vec<Employee>, StoreError> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.is_active)
            .filter(|e| department.is_none() || e.department.as_deref() == department)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_record(&self, key: &AttendanceKey) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    async fn insert_clock_in(&self, record: &AttendanceRecord) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        if let Some(winner) = self.racing_writer.lock().unwrap().take() {
            records.insert(winner.key(), winner);
            return Ok(false);
        }
        if records.contains_key(&record.key()) {
            return Ok(false);
        }
        records.insert(record.key(), record.clone());
        self.markers.lock().unwrap().remove(&record.key());
        Ok(true)
    }

    async fn set_clock_out(&self, key: &AttendanceKey, clock_out: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(key) {
            Some(record) if record.clock_out_time.is_none() && clock_out > record.clock_in_time => {
                record.clock_out_time = Some(clock_out);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn employees_with_records(&self, date: NaiveDate) -> Result<HashSet<u64>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.calendar_date == date)
            .map(|key| key.employee_id)
            .collect())
    }

    async fn insert_absence_markers(&self, date: NaiveDate, employee_ids: &[u64]) -> Result<u64, StoreError> {
        let mut markers = self.markers.lock().unwrap();
        let created = employee_ids
            .iter()
            .filter(|id| markers.insert(AttendanceKey::new(**id, date)))
            .count();
        Ok(created as u64)
    }

    async fn list_records(&self, filter: &ReportFilter) -> Result<Vec<ReportRow>, StoreError> {
        let employees = self.employees.lock().unwrap();
        let records = self.records.lock().unwrap();

        let mut rows: Vec<ReportRow> = records
            .values()
            .filter(|r| r.calendar_date >= filter.start_date && r.calendar_date <= filter.end_date)
            .filter_map(|r| employees.get(&r.employee_id).map(|e| (r, e)))
            .filter(|(_, e)| match &filter.department {
                Some(department) => e.department.as_deref() == Some(department.as_str()),
                None => true,
            })
            .map(|(r, e)| ReportRow::new(r.clone(), e.name.clone(), e.department.clone()))
            .collect();
        rows.sort_by(|a, b| b.record.clock_in_time.cmp(&a.record.clock_in_time));
        Ok(rows)
    }
}
