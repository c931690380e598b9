//! Cron expression parsing and next-run-time computation.
//!
//! Agents are configured with a standard five-field cron expression
//! (`min hour day-of-month month day-of-week`). The `cron` crate parses a
//! six-field form with a leading seconds field, so a five-field expression
//! is normalised by prepending a `0` seconds field before parsing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{SchedulerError, SchedulerResult};

fn normalize(expr: &str) -> String {
    let fields = expr.split_whitespace().count();
    if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

/// Parse and validate a cron expression, accepting either the standard
/// five-field form or the six-field form with seconds.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidCron`] if the expression cannot be
/// parsed.
pub fn parse(expr: &str) -> SchedulerResult<Schedule> {
    Schedule::from_str(&normalize(expr))
        .map_err(|e| SchedulerError::InvalidCron(expr.to_string(), e.to_string()))
}

/// The next time `expr` fires strictly after `after`.
///
/// `Schedule`'s iterator already scans forward field by field with the
/// standard Sunday-as-0-or-7 rule; this just takes the first match.
///
/// # Errors
///
/// Returns [`SchedulerError::InvalidCron`] if the expression is malformed or
/// never fires again (e.g. a day-of-month/month combination that can never
/// occur).
pub fn next_run_after(expr: &str, after: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    let schedule = parse(expr)?;
    schedule.after(&after).next().ok_or_else(|| {
        SchedulerError::InvalidCron(expr.to_string(), "schedule never fires again".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expression_parses() {
        assert!(parse("*/5 * * * *").is_ok());
    }

    #[test]
    fn six_field_expression_with_seconds_parses() {
        assert!(parse("0 */5 * * * *").is_ok());
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let err = parse("not a cron expr").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCron(_, _)));
    }

    #[test]
    fn next_run_after_advances_to_next_matching_minute() {
        let after = Utc.with_ymd_and_hms(2026, 7, 28, 10, 2, 30).unwrap();
        let next = next_run_after("*/5 * * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 28, 10, 5, 0).unwrap());
    }

    #[test]
    fn next_run_after_daily_schedule_rolls_to_tomorrow() {
        let after = Utc.with_ymd_and_hms(2026, 7, 28, 4, 0, 0).unwrap();
        let next = next_run_after("0 3 * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 7, 29, 3, 0, 0).unwrap());
    }

    #[test]
    fn sunday_accepted_as_weekday_zero() {
        // 2026-08-02 is a Sunday.
        let after = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();
        let next = next_run_after("0 6 * * 0", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 2, 6, 0, 0).unwrap());
    }
}
