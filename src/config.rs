use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Duration, FixedOffset, NaiveTime};
use dotenvy::dotenv;

use crate::engine::AttendancePolicy;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    pub policy: AttendancePolicy,
    pub absence_sweep_enabled: bool,
    pub absence_sweep_grace: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed(&lookup, "ACCESS_TOKEN_TTL", 900)?, // default 15 min
            refresh_token_ttl: parsed(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // default 7 days

            rate_login_per_min: parsed(&lookup, "RATE_LOGIN_PER_MIN", 5)?,
            rate_refresh_per_min: parsed(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parsed(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),

            policy: policy_from_lookup(&lookup)?,
            absence_sweep_enabled: parsed(&lookup, "ABSENCE_SWEEP_ENABLED", true)?,
            absence_sweep_grace: Duration::minutes(parsed(&lookup, "ABSENCE_SWEEP_GRACE_MINUTES", 5)?),
        })
    }
}

fn policy_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<AttendancePolicy> {
    let recognition_threshold: f64 = parsed(lookup, "FACE_RECOGNITION_THRESHOLD", 0.75)?;
    if !(0.0..=1.0).contains(&recognition_threshold) {
        bail!("FACE_RECOGNITION_THRESHOLD must be between 0 and 1, got {recognition_threshold}");
    }

    let working_hours_start = time_of_day(lookup, "WORKING_HOURS_START", "09:00")?;
    let working_hours_end = time_of_day(lookup, "WORKING_HOURS_END", "17:00")?;
    if working_hours_end <= working_hours_start {
        bail!("WORKING_HOURS_END ({working_hours_end}) must be after WORKING_HOURS_START ({working_hours_start})");
    }

    let late_threshold: i64 = parsed(lookup, "LATE_THRESHOLD_MINUTES", 30)?;
    let min_clockout: i64 = parsed(lookup, "MIN_CLOCKOUT_INTERVAL_MINUTES", 10)?;
    if late_threshold < 0 || min_clockout < 0 {
        bail!("LATE_THRESHOLD_MINUTES and MIN_CLOCKOUT_INTERVAL_MINUTES must not be negative");
    }

    let offset = lookup("TIMEZONE_OFFSET").unwrap_or_else(|| "+00:00".to_string());
    let timezone = parse_offset(&offset).with_context(|| format!("invalid TIMEZONE_OFFSET {offset:?}"))?;

    Ok(AttendancePolicy {
        recognition_threshold,
        working_hours_start,
        working_hours_end,
        late_threshold: Duration::minutes(late_threshold),
        min_clockout_interval: Duration::minutes(min_clockout),
        timezone,
    })
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

fn time_of_day(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<NaiveTime> {
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").with_context(|| format!("{key} must be HH:MM, got {raw:?}"))
}

/// Parses a fixed UTC offset written as `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("zero offset"));
    }

    let (sign, rest) = match raw.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!("offset must start with + or -"),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(|| anyhow!("offset must be ±HH:MM"))?;
    let hours: i32 = hours.parse().context("offset hours")?;
    let minutes: i32 = minutes.parse().context("offset minutes")?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        bail!("offset out of range");
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| anyhow!("offset out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://localhost/attendance"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_match_the_documented_policy() {
        let config = Config::from_lookup(lookup_from(&BASE)).unwrap();
        let policy = &config.policy;

        assert_eq!(policy.recognition_threshold, 0.75);
        assert_eq!(policy.working_hours_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(policy.working_hours_end, NaiveTime::from_hms_opt(17, 0, 0).unwrap());
        assert_eq!(policy.late_threshold, Duration::minutes(30));
        assert_eq!(policy.min_clockout_interval, Duration::minutes(10));
        assert_eq!(policy.timezone.local_minus_utc(), 0);
        assert_eq!(config.api_prefix, "/api");
        assert!(config.absence_sweep_enabled);
        assert_eq!(config.access_token_ttl, 900);
    }

    #[test]
    fn policy_values_are_read_from_the_environment() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("FACE_RECOGNITION_THRESHOLD", "0.6"),
            ("WORKING_HOURS_START", "08:30"),
            ("LATE_THRESHOLD_MINUTES", "15"),
            ("MIN_CLOCKOUT_INTERVAL_MINUTES", "5"),
            ("TIMEZONE_OFFSET", "+05:30"),
            ("ABSENCE_SWEEP_ENABLED", "false"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.policy.recognition_threshold, 0.6);
        assert_eq!(config.policy.working_hours_start, NaiveTime::from_hms_opt(8, 30, 0).unwrap());
        assert_eq!(config.policy.late_threshold, Duration::minutes(15));
        assert_eq!(config.policy.min_clockout_interval, Duration::minutes(5));
        assert_eq!(config.policy.timezone.local_minus_utc(), 5 * 3600 + 30 * 60);
        assert!(!config.absence_sweep_enabled);
    }

    #[test]
    fn missing_required_keys_fail() {
        let err = Config::from_lookup(lookup_from(&BASE[..2])).err().unwrap();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn invalid_values_fail_instead_of_panicking() {
        for (key, value) in [
            ("FACE_RECOGNITION_THRESHOLD", "1.5"),
            ("WORKING_HOURS_START", "9am"),
            ("WORKING_HOURS_END", "08:00"),
            ("MIN_CLOCKOUT_INTERVAL_MINUTES", "-1"),
            ("TIMEZONE_OFFSET", "CET"),
            ("ACCESS_TOKEN_TTL", "soon"),
        ] {
            let mut pairs = BASE.to_vec();
            pairs.push((key, value));
            assert!(Config::from_lookup(lookup_from(&pairs)).is_err(), "{key}={value} should be rejected");
        }
    }

    #[test]
    fn offsets_parse_in_both_directions() {
        assert_eq!(parse_offset("+02:00").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_offset("-03:30").unwrap().local_minus_utc(), -(3 * 3600 + 1800));
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("02:00").is_err());
        assert!(parse_offset("+25:00").is_err());
    }
}
