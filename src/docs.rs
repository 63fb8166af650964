use crate::api::attendance::{AbsenteesResponse, EventResponse, RecognitionEvent, SummaryResponse};
use crate::model::attendance::{AttendanceStatus, EventKind};
use crate::models::{LoginReqDto, TokenPair};
use crate::report::{DepartmentStats, ReportFilter, ReportRowResponse, ReportSummary, TodaySnapshot};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FaceTrack Attendance API",
        version = "1.0.0",
        description = r#"
## Face Recognition Attendance

Turns face matches from kiosks into daily attendance.

### 🔹 Key Features
- **Recognition events**
  - The first accepted match of a day clocks the employee in, a later one clocks them out
  - Arrivals after the start of the working day are marked late
- **Reports**
  - Records, summaries and per-department statistics for any date range
  - A dashboard snapshot for the current day
- **Absentees**
  - Active employees without attendance are marked absent once the day has ended

### 🔐 Security
Endpoints under `/api` require a **JWT Bearer** access token.
Kiosks and system accounts submit events; **Admin** and **HR** read reports.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::record_event,
        crate::api::attendance::list_records,
        crate::api::attendance::summary,
        crate::api::attendance::today,
        crate::api::attendance::mark_absentees
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            RecognitionEvent,
            EventResponse,
            EventKind,
            AttendanceStatus,
            ReportFilter,
            ReportRowResponse,
            ReportSummary,
            DepartmentStats,
            SummaryResponse,
            TodaySnapshot,
            AbsenteesResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign-in and token rotation"),
        (name = "Attendance", description = "Recognition events and attendance reports"),
    )
)]
pub struct ApiDoc;

/// Prefix the handler annotations are written against.
const DOCUMENTED_PREFIX: &str = "/api";

/// OpenAPI document with the protected paths moved under `api_prefix`.
pub fn api_doc(api_prefix: &str) -> openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    let prefix = api_prefix.trim_end_matches('/');
    if prefix == DOCUMENTED_PREFIX {
        return doc;
    }

    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| match path.strip_prefix(DOCUMENTED_PREFIX) {
            Some(rest) if rest.starts_with('/') => (format!("{prefix}{rest}"), item),
            _ => (path, item),
        })
        .collect();
    doc
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
