//! Cron and timezone evaluation.
//!
//! Expressions are standard five-field cron (`minute hour day-of-month month
//! day-of-week`). The `cron` crate wants a leading seconds field and numbers
//! weekdays 1–7 from Sunday, so expressions are rewritten before parsing.
//! When both day fields are restricted, a day matches if either does, as in
//! classic cron.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A parsed expression. Holds two schedules when day-of-month and
/// day-of-week are both restricted; their union is the match set.
struct CronSpec {
    schedules: Vec<cron::Schedule>,
}

impl CronSpec {
    fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(
                expr,
                format!(
                    "expected 5 fields (minute hour day-of-month month day-of-week), got {}",
                    fields.len()
                ),
            ));
        }
        let (minute, hour, dom, month, dow) =
            (fields[0], fields[1], fields[2], fields[3], fields[4]);
        let dow = translate_dow(dow).map_err(|m| invalid(expr, m))?;

        let dom_restricted = !matches!(dom, "*" | "?");
        let dow_restricted = !matches!(dow.as_str(), "*" | "?");

        let variants = if dom_restricted && dow_restricted {
            vec![
                format!("0 {minute} {hour} {dom} {month} *"),
                format!("0 {minute} {hour} * {month} {dow}"),
            ]
        } else {
            vec![format!("0 {minute} {hour} {dom} {month} {dow}")]
        };

        let schedules = variants
            .iter()
            .map(|v| cron::Schedule::from_str(v).map_err(|e| invalid(expr, e.to_string())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { schedules })
    }

    /// First match strictly after `from`, evaluated in `tz`.
    fn next_after(&self, tz: Tz, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = from.with_timezone(&tz);
        self.schedules
            .iter()
            .filter_map(|s| s.after(&local).next())
            .map(|dt| dt.with_timezone(&Utc))
            .min()
    }
}

fn invalid(expr: &str, message: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidCron {
        expr: expr.to_string(),
        message: message.into(),
    }
}

/// Rewrite a standard day-of-week field (0–7, Sunday = 0 or 7, names
/// allowed) into the `cron` crate's 1–7 numbering.
fn translate_dow(field: &str) -> std::result::Result<String, String> {
    field
        .split(',')
        .map(translate_dow_item)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(|items| items.join(","))
}

fn translate_dow_item(item: &str) -> std::result::Result<String, String> {
    let (range, step) = match item.split_once('/') {
        Some((r, s)) => {
            let step: u8 = s.parse().map_err(|_| format!("invalid day-of-week step `{s}`"))?;
            if step == 0 {
                return Err("day-of-week step must be positive".to_string());
            }
            (r, Some(step))
        }
        None => (item, None),
    };
    let suffix = step.map(|s| format!("/{s}")).unwrap_or_default();

    if range == "*" || range == "?" {
        return Ok(format!("{range}{suffix}"));
    }

    match range.split_once('-') {
        Some((a, b)) => {
            let start = dow_value(a)? % 7;
            let end = dow_value(b)?;
            if end < start {
                return Err(format!("day-of-week range `{range}` runs backwards"));
            }
            if end == 7 && start > 0 {
                // cron counts Sunday as 1, so "5-7" has to wrap.
                let mut out = format!("{}-7{suffix}", start + 1);
                if (7 - start) % step.unwrap_or(1) == 0 {
                    out.push_str(",1");
                }
                return Ok(out);
            }
            let end = if end == 7 { 6 } else { end };
            Ok(format!("{}-{}{suffix}", start + 1, end + 1))
        }
        None => Ok(format!("{}{suffix}", dow_value(range)? % 7 + 1)),
    }
}

fn dow_value(token: &str) -> std::result::Result<u8, String> {
    if let Ok(n) = token.parse::<u8>() {
        if n <= 7 {
            return Ok(n);
        }
        return Err(format!("day-of-week `{n}` out of range 0-7"));
    }
    let upper = token.to_ascii_uppercase();
    WEEKDAY_NAMES
        .iter()
        .position(|name| *name == upper)
        .map(|i| i as u8)
        .ok_or_else(|| format!("unknown day-of-week `{token}`"))
}

/// Check that `expr` is a well-formed five-field cron expression.
pub fn validate(expr: &str) -> Result<()> {
    CronSpec::parse(expr).map(|_| ())
}

/// Resolve an IANA zone name; empty means UTC.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    if name.is_empty() {
        return Ok(Tz::UTC);
    }
    name.parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(name.to_string()))
}

/// Check that `name` is a known IANA zone (or empty).
pub fn validate_timezone(name: &str) -> Result<()> {
    parse_timezone(name).map(|_| ())
}

/// First instant strictly after `from` matching `expr` in `timezone`.
///
/// A local time that falls in a daylight-saving gap does not exist on that
/// day, so the occurrence is skipped rather than shifted.
pub fn next(expr: &str, timezone: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let tz = parse_timezone(timezone)?;
    CronSpec::parse(expr)?
        .next_after(tz, from)
        .ok_or_else(|| invalid(expr, "expression has no future occurrences"))
}

/// Cron and timezone checks applied before a schedule is persisted.
pub fn validate_timing(schedule: &Schedule) -> Result<()> {
    if !schedule.cron_expr.is_empty() {
        validate(&schedule.cron_expr)
            .map_err(|e| SchedulerError::invalid("cron_expr", e.to_string()))?;
    }
    validate_timezone(&schedule.timezone)
        .map_err(|e| SchedulerError::invalid("timezone", e.to_string()))?;
    Ok(())
}

/// When `schedule` should run next, looking from `from`.
///
/// * one-time: `scheduled_at`, even if it lies in the past
/// * recurring: next cron match after `from`
/// * both set: `scheduled_at` anchors the first run. While the anchor is
///   still ahead of `from` the result is the anchor itself if it sits on the
///   cron grid, otherwise the first cron match after it. Once the anchor has
///   passed, plain cron evaluation applies.
///
/// Returns `None` when neither field is set.
pub fn calculate_next_execution(
    schedule: &Schedule,
    from: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    match (schedule.scheduled_at, schedule.cron_expr.is_empty()) {
        (Some(at), true) => Ok(Some(at)),
        (None, false) => next(&schedule.cron_expr, &schedule.timezone, from).map(Some),
        (Some(anchor), false) => {
            if anchor <= from {
                return next(&schedule.cron_expr, &schedule.timezone, from).map(Some);
            }
            let tz = parse_timezone(&schedule.timezone)?;
            let spec = CronSpec::parse(&schedule.cron_expr)?;
            let candidate = spec.next_after(tz, anchor - Duration::seconds(1));
            let first = match candidate {
                Some(c) if c >= anchor => Some(c),
                _ => spec.next_after(tz, anchor),
            };
            first
                .map(Some)
                .ok_or_else(|| invalid(&schedule.cron_expr, "expression has no future occurrences"))
        }
        (None, true) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn tokyo_morning_job_after_local_evening() {
        // 2024-01-01 17:00 JST
        let next = next("0 9 * * *", "Asia/Tokyo", utc(2024, 1, 1, 8, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 2, 0, 0));
    }

    #[test]
    fn empty_timezone_is_utc() {
        let next = next("30 * * * *", "", utc(2024, 1, 1, 8, 10)).unwrap();
        assert_eq!(next, utc(2024, 1, 1, 8, 30));
    }

    #[test]
    fn local_time_in_spring_forward_gap_is_skipped() {
        // 02:30 does not exist in New York on 2024-03-10
        assert_eq!(
            next("30 2 * * *", "America/New_York", utc(2024, 3, 10, 5, 0)).unwrap(),
            utc(2024, 3, 11, 6, 30)
        );
        // the day after the change fires at 02:30 EDT as usual
        assert_eq!(
            next("30 2 * * *", "America/New_York", utc(2024, 3, 11, 7, 0)).unwrap(),
            utc(2024, 3, 12, 6, 30)
        );
    }

    #[test]
    fn weekday_numbers_follow_standard_cron() {
        // 2024-01-01 is a Monday
        assert_eq!(next("0 9 * * 1", "", utc(2024, 1, 1, 10, 0)).unwrap(), utc(2024, 1, 8, 9, 0));
        // Friday 2024-01-05 evening -> Monday
        assert_eq!(next("0 9 * * 1-5", "", utc(2024, 1, 5, 18, 0)).unwrap(), utc(2024, 1, 8, 9, 0));
        // 0 and 7 are both Sunday (2024-01-07)
        assert_eq!(next("0 0 * * 0", "", utc(2024, 1, 2, 0, 0)).unwrap(), utc(2024, 1, 7, 0, 0));
        assert_eq!(next("0 0 * * 7", "", utc(2024, 1, 2, 0, 0)).unwrap(), utc(2024, 1, 7, 0, 0));
        // Friday through Sunday wraps
        assert_eq!(next("0 0 * * 5-7", "", utc(2024, 1, 6, 1, 0)).unwrap(), utc(2024, 1, 7, 0, 0));
        assert_eq!(next("0 0 * * sat", "", utc(2024, 1, 1, 0, 0)).unwrap(), utc(2024, 1, 6, 0, 0));
    }

    #[test]
    fn restricted_day_fields_are_or_ed() {
        // 15th of the month or any Monday; from Tue 2024-01-02 the Monday (8th) comes first
        let next = next("0 12 15 * 1", "", utc(2024, 1, 2, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 8, 12, 0));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert!(validate("0 9 * * *").is_ok());
        assert!(validate("*/15 * * * *").is_ok());
        for bad in [
            "",
            "0 9 * *",
            "0 0 9 * * *",
            "61 * * * *",
            "* * * * 8",
            "* * * * 5-2",
            "bogus * * * *",
        ] {
            assert!(validate(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert!(matches!(
            next("0 9 * * *", "Mars/Olympus", utc(2024, 1, 1, 0, 0)),
            Err(SchedulerError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn one_time_schedule_returns_scheduled_at_even_when_past() {
        let at = utc(2020, 6, 1, 12, 0);
        let s = Schedule::new("s", "n", "u").with_scheduled_at(at);
        assert_eq!(calculate_next_execution(&s, utc(2024, 1, 1, 0, 0)).unwrap(), Some(at));
    }

    #[test]
    fn anchor_on_grid_is_first_occurrence() {
        let anchor = utc(2024, 3, 1, 9, 0);
        let s = Schedule::new("s", "n", "u")
            .with_cron("0 9 * * *", "")
            .with_scheduled_at(anchor);
        assert_eq!(calculate_next_execution(&s, utc(2024, 1, 1, 0, 0)).unwrap(), Some(anchor));
    }

    #[test]
    fn anchor_off_grid_rounds_up_to_cron() {
        let s = Schedule::new("s", "n", "u")
            .with_cron("0 9 * * *", "")
            .with_scheduled_at(utc(2024, 3, 1, 9, 30));
        assert_eq!(
            calculate_next_execution(&s, utc(2024, 1, 1, 0, 0)).unwrap(),
            Some(utc(2024, 3, 2, 9, 0))
        );
    }

    #[test]
    fn passed_anchor_falls_back_to_cron() {
        let s = Schedule::new("s", "n", "u")
            .with_cron("0 9 * * *", "")
            .with_scheduled_at(utc(2024, 1, 1, 9, 0));
        assert_eq!(
            calculate_next_execution(&s, utc(2024, 2, 1, 10, 0)).unwrap(),
            Some(utc(2024, 2, 2, 9, 0))
        );
    }

    #[test]
    fn validate_timing_reports_field() {
        let bad_cron = Schedule::new("s", "n", "u").with_cron("nope", "");
        match validate_timing(&bad_cron) {
            Err(SchedulerError::InvalidSchedule { field, .. }) => assert_eq!(field, "cron_expr"),
            other => panic!("unexpected {other:?}"),
        }
        let bad_tz = Schedule::new("s", "n", "u").with_cron("0 9 * * *", "Nowhere/Land");
        match validate_timing(&bad_tz) {
            Err(SchedulerError::InvalidSchedule { field, .. }) => assert_eq!(field, "timezone"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
