//! Daily absentee sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use tracing::{error, info};

use crate::engine::AttendanceEngine;

/// Next sweep instant and the local date it covers. The sweep runs `grace`
/// after local midnight and always targets the day that just ended.
pub fn next_sweep(now: DateTime<Utc>, timezone: FixedOffset, grace: Duration) -> (DateTime<Utc>, NaiveDate) {
    let local_today = now.with_timezone(&timezone).date_naive();

    let run_at = |day: NaiveDate| -> DateTime<Utc> {
        let local_midnight = day.and_time(chrono::NaiveTime::MIN) + grace;
        let utc = local_midnight - Duration::seconds(i64::from(timezone.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    };

    let today_run = run_at(local_today);
    let (run, day) = if today_run > now {
        (today_run, local_today)
    } else {
        let tomorrow = local_today.succ_opt().unwrap_or(local_today);
        (run_at(tomorrow), tomorrow)
    };

    (run, day.pred_opt().unwrap_or(day))
}

/// Runs `mark_absentees` once per local day for the day that just ended.
pub fn spawn_absence_sweep(engine: Arc<AttendanceEngine>, grace: Duration) {
    actix_web::rt::spawn(async move {
        let timezone = engine.policy().timezone;
        loop {
            let now = Utc::now();
            let (run_at, date) = next_sweep(now, timezone, grace);
            let wait = (run_at - now).to_std().unwrap_or_default();
            info!(%date, %run_at, "next absentee sweep scheduled");
            actix_web::rt::time::sleep(wait).await;

            match engine.mark_absentees(date).await {
                Ok(absent) => info!(%date, absent = absent.len(), "absentee sweep finished"),
                Err(e) => error!(error = %e, %date, "absentee sweep failed"),
            }
        }
    });
}
