use crate::{
    auth::auth::AuthUser,
    engine::{AttendanceEngine, AttendanceError},
    model::attendance::{AttendanceStatus, EventKind, EventOutcome, as_hours},
    report::{DepartmentStats, ReportError, ReportFilter, ReportRowResponse, ReportSummary, ReportingReader},
};
use actix_web::{HttpResponse, Responder, ResponseError, http::StatusCode, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::InvalidConfidence(_) => StatusCode::BAD_REQUEST,
            AttendanceError::LowConfidenceMatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::UnknownOrInactiveEmployee { .. } => StatusCode::NOT_FOUND,
            AttendanceError::OutOfOrderEvent { .. }
            | AttendanceError::ClockOutTooSoon { .. }
            | AttendanceError::AlreadyCompletedToday { .. } => StatusCode::CONFLICT,
            AttendanceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AttendanceError::Store(e) => {
                error!(error = %e, "Attendance store failure");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "code": self.code(),
            "message": message
        }))
    }
}

impl ResponseError for ReportError {
    fn status_code(&self) -> StatusCode {
        match self {
            ReportError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
            ReportError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ReportError::Store(e) => {
                error!(error = %e, "Report query failed");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}

/// A face match produced by the recognition front end.
#[derive(Deserialize, ToSchema)]
pub struct RecognitionEvent {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = 0.91)]
    pub confidence: f64,
    /// Capture time; the server clock is used when omitted.
    #[schema(example = "2026-03-02T08:55:00Z", value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub event: EventKind,
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2026-03-02", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(value_type = String, format = "date-time")]
    pub clock_in_time: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub clock_out_time: Option<DateTime<Utc>>,
    #[schema(example = 0)]
    pub minutes_late: Option<i64>,
    #[schema(example = 8.25)]
    pub hours_worked: Option<f64>,
    #[schema(example = "Attendance marked as present")]
    pub message: String,
}

impl From<&EventOutcome> for EventResponse {
    fn from(outcome: &EventOutcome) -> Self {
        let hours_worked = outcome.hours_worked().map(as_hours);
        let (minutes_late, message) = match outcome.kind {
            EventKind::ClockIn => (
                Some(outcome.minutes_late),
                format!("Attendance marked as {}", outcome.status()),
            ),
            EventKind::ClockOut => (
                None,
                format!("Clocked out successfully. Hours worked: {:.2}", hours_worked.unwrap_or_default()),
            ),
        };

        Self {
            event: outcome.kind,
            employee_id: outcome.record.employee_id,
            date: outcome.record.calendar_date,
            status: outcome.status(),
            clock_in_time: outcome.record.clock_in_time,
            clock_out_time: outcome.record.clock_out_time,
            minutes_late,
            hours_worked,
            message,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SummaryResponse {
    pub summary: ReportSummary,
    pub departments: Vec<DepartmentStats>,
}

#[derive(Serialize, ToSchema)]
pub struct AbsenteesResponse {
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = json!([2, 5]))]
    pub employee_ids: Vec<u64>,
}

/// Record a recognition event
#[utoipa::path(
    post,
    path = "/api/attendance/events",
    request_body = RecognitionEvent,
    responses(
        (status = 200, description = "Clock-in or clock-out recorded", body = EventResponse),
        (status = 400, description = "Confidence is not a score in [0, 1]"),
        (status = 404, description = "Unknown or inactive employee", body = Object, example = json!({
            "code": "unknown_or_inactive_employee",
            "message": "employee 42 is unknown or inactive"
        })),
        (status = 409, description = "Out of order, too soon to clock out, or day already complete", body = Object, example = json!({
            "code": "clock_out_too_soon",
            "message": "cannot clock out yet: 3 of 10 required minutes elapsed"
        })),
        (status = 422, description = "Match confidence below threshold"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn record_event(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<RecognitionEvent>,
) -> actix_web::Result<impl Responder> {
    auth.require_event_source()?;

    // Only place the wall clock enters an event.
    let timestamp = payload.timestamp.unwrap_or_else(Utc::now);

    let outcome = engine
        .record_event(payload.employee_id, timestamp, payload.confidence)
        .await
        .inspect_err(|e| {
            info!(
                code = e.code(),
                employee_id = payload.employee_id,
                submitted_by = %auth.email,
                operator_employee = ?auth.employee_id,
                "Attendance event refused"
            )
        })?;

    Ok(HttpResponse::Ok().json(EventResponse::from(&outcome)))
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/attendance/records",
    params(ReportFilter),
    responses(
        (status = 200, description = "Attendance rows, newest first", body = [ReportRowResponse]),
        (status = 400, description = "start_date after end_date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_records(
    auth: AuthUser,
    reader: web::Data<ReportingReader>,
    query: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let rows = reader.records(&query).await?;
    let data: Vec<ReportRowResponse> = rows.iter().map(ReportRowResponse::from).collect();
    Ok(HttpResponse::Ok().json(data))
}

/// Attendance summary for a date range
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(ReportFilter),
    responses(
        (status = 200, description = "Summary and per-department statistics", body = SummaryResponse),
        (status = 400, description = "start_date after end_date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn summary(
    auth: AuthUser,
    reader: web::Data<ReportingReader>,
    query: web::Query<ReportFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (summary, departments) = reader.summary(&query).await?;
    Ok(HttpResponse::Ok().json(SummaryResponse {
        summary,
        departments,
    }))
}

/// Today's dashboard counts
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Counts for the current local date", body = crate::report::TodaySnapshot),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    reader: web::Data<ReportingReader>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = engine.policy().today(Utc::now());
    let snapshot = reader.today(date).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

/// Mark absentees for an elapsed date
#[utoipa::path(
    post,
    path = "/api/attendance/absentees/{date}",
    params(
        ("date" = String, Path, description = "Local calendar date, YYYY-MM-DD; must be before today")
    ),
    responses(
        (status = 200, description = "Active employees with no attendance on the date", body = AbsenteesResponse),
        (status = 400, description = "Date has not fully elapsed", body = Object, example = json!({
            "message": "2026-03-02 has not ended yet"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_absentees(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<NaiveDate>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let date = path.into_inner();
    if date >= engine.policy().today(Utc::now()) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": format!("{date} has not ended yet")
        })));
    }

    let employee_ids = engine.mark_absentees(date).await?;
    Ok(HttpResponse::Ok().json(AbsenteesResponse { date, employee_ids }))
}
