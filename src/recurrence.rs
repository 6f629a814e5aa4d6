//src/recurrence.rs
use crate::db::{self, DbError, RecurringRule};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Weekday};
use rusqlite::Connection;
use std::collections::HashSet;

/// Unix seconds at local midnight of `date`. Around DST transitions where
/// midnight does not exist locally, the earliest valid instant is used.
pub fn local_midnight(date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| naive.and_utc().timestamp())
}

/// The local calendar date a stored midnight timestamp falls on.
pub fn date_from_timestamp(ts: i64) -> NaiveDate {
    DateTime::from_timestamp(ts, 0)
        .map(|utc| utc.with_timezone(&Local).date_naive())
        .unwrap_or(NaiveDate::MIN)
}

pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}

/// How a rule repeats, decoded from its stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cadence {
    /// Every `interval` days, counted from `start`.
    EveryNDays { start: NaiveDate, interval: i64 },
    /// On the next calendar day whose weekday is in the set.
    OnWeekdays(HashSet<Weekday>),
    /// Neither cadence is usable; such a rule falls back to firing today.
    Unspecified,
}

impl Cadence {
    /// A positive interval wins over the weekday set when both are stored;
    /// invalid weekday tokens are dropped rather than failing the rule.
    pub fn from_rule(rule: &RecurringRule) -> Self {
        if rule.interval_days > 0 {
            return Cadence::EveryNDays {
                start: date_from_timestamp(rule.start_date),
                interval: rule.interval_days,
            };
        }
        if let Some(spec) = rule.days_of_week.as_deref() {
            let days = parse_weekday_set(spec);
            if !days.is_empty() {
                return Cadence::OnWeekdays(days);
            }
        }
        Cadence::Unspecified
    }
}

/// Parses a comma-separated weekday list using 0 = Sunday through
/// 6 = Saturday. Tokens outside that range are ignored.
pub fn parse_weekday_set(spec: &str) -> HashSet<Weekday> {
    spec.split(',')
        .filter_map(|token| token.trim().parse::<u8>().ok())
        .filter_map(|n| match n {
            0 => Some(Weekday::Sun),
            1 => Some(Weekday::Mon),
            2 => Some(Weekday::Tue),
            3 => Some(Weekday::Wed),
            4 => Some(Weekday::Thu),
            5 => Some(Weekday::Fri),
            6 => Some(Weekday::Sat),
            _ => None,
        })
        .collect()
}

/// The next date on or after `today` that the cadence selects.
///
/// Interval rules step forward from their start date, so the result always
/// falls on the rule's own grid. Weekday rules scan the seven days starting
/// tomorrow, which covers every weekday exactly once; a weekday rule never
/// fires on `today` itself.
pub fn next_occurrence(cadence: &Cadence, today: NaiveDate) -> NaiveDate {
    match cadence {
        Cadence::EveryNDays { start, interval } => {
            let mut candidate = *start;
            while candidate < today {
                candidate += Duration::days(*interval);
            }
            candidate
        }
        Cadence::OnWeekdays(days) => {
            for offset in 1..=7 {
                let candidate = today + Duration::days(offset);
                if days.contains(&candidate.weekday()) {
                    return candidate;
                }
            }
            // Unreachable for a non-empty set, but stay total.
            today
        }
        Cadence::Unspecified => today,
    }
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// (rule id, new log id, date) for each materialized occurrence.
    pub created: Vec<(i64, i64, NaiveDate)>,
    /// Rules whose next occurrence already had a log.
    pub skipped: usize,
    /// (rule id, error text) for rules that failed; the rest still ran.
    pub failed: Vec<(i64, String)>,
}

/// Walks every recurring rule and materializes its next occurrence as a
/// workout log unless one already exists for that (date, workout, day).
/// A failing rule is recorded and skipped so one bad rule cannot block the
/// others.
pub fn reconcile(conn: &mut Connection, today: NaiveDate) -> Result<ReconcileReport, DbError> {
    let rules = db::list_rules(conn)?;
    let mut report = ReconcileReport::default();

    for rule in rules {
        match materialize_rule(conn, &rule, today) {
            Ok(Some((log_id, date))) => report.created.push((rule.id, log_id, date)),
            Ok(None) => report.skipped += 1,
            Err(e) => report.failed.push((rule.id, e.to_string())),
        }
    }
    Ok(report)
}

fn materialize_rule(
    conn: &mut Connection,
    rule: &RecurringRule,
    today: NaiveDate,
) -> Result<Option<(i64, NaiveDate)>, DbError> {
    let cadence = Cadence::from_rule(rule);
    let date = next_occurrence(&cadence, today);
    if date < today {
        return Ok(None);
    }
    let ts = local_midnight(date);
    if db::log_exists(conn, ts, &rule.workout_name, &rule.day_name)? {
        return Ok(None);
    }
    let log_id = db::insert_log_with_snapshot(conn, rule.day_id, ts)?;
    Ok(Some((log_id, date)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn interval_steps_from_start_onto_or_past_today() {
        let cadence = Cadence::EveryNDays {
            start: date(2025, 1, 1),
            interval: 3,
        };
        // 2025-01-01, 04, 07, 10...
        assert_eq!(next_occurrence(&cadence, date(2025, 1, 5)), date(2025, 1, 7));
        assert_eq!(next_occurrence(&cadence, date(2025, 1, 7)), date(2025, 1, 7));
    }

    #[test]
    fn interval_start_in_future_is_returned_unchanged() {
        let cadence = Cadence::EveryNDays {
            start: date(2025, 6, 1),
            interval: 7,
        };
        assert_eq!(next_occurrence(&cadence, date(2025, 1, 1)), date(2025, 6, 1));
    }

    #[test]
    fn weekday_rule_picks_first_matching_day_after_today() {
        // 2025-01-06 is a Monday.
        let cadence = Cadence::OnWeekdays(parse_weekday_set("3,5")); // Wed, Fri
        assert_eq!(next_occurrence(&cadence, date(2025, 1, 6)), date(2025, 1, 8));
        // From Wednesday the rule skips today and lands on Friday.
        assert_eq!(next_occurrence(&cadence, date(2025, 1, 8)), date(2025, 1, 10));
    }

    #[test]
    fn weekday_set_parsing_is_lenient() {
        let days = parse_weekday_set("0, 6, banana, 9");
        assert_eq!(days.len(), 2);
        assert!(days.contains(&Weekday::Sun));
        assert!(days.contains(&Weekday::Sat));
        assert!(parse_weekday_set("").is_empty());
    }

    #[test]
    fn interval_takes_precedence_over_weekday_set() {
        // Both columns populated, as after editing a weekday rule onto an
        // interval rule; the interval grid decides.
        let rule = RecurringRule {
            id: 1,
            workout_id: 1,
            day_id: 1,
            workout_name: "PPL".into(),
            day_name: "Push".into(),
            // 2025-01-06 is a Monday.
            start_date: local_midnight(date(2025, 1, 6)),
            interval_days: 7,
            days_of_week: Some("3".into()),
        };
        let cadence = Cadence::from_rule(&rule);
        assert!(matches!(cadence, Cadence::EveryNDays { interval: 7, .. }));
        assert_eq!(next_occurrence(&cadence, date(2025, 1, 6)), date(2025, 1, 6));
    }

    #[test]
    fn rule_without_cadence_falls_back_to_today() {
        let rule = RecurringRule {
            id: 7,
            workout_id: 1,
            day_id: 1,
            workout_name: "PPL".into(),
            day_name: "Push".into(),
            start_date: 0,
            interval_days: 0,
            days_of_week: Some(" ,banana".into()),
        };
        let cadence = Cadence::from_rule(&rule);
        assert_eq!(cadence, Cadence::Unspecified);
        let today = date(2025, 1, 6);
        assert_eq!(next_occurrence(&cadence, today), today);
    }

    #[test]
    fn midnight_round_trip_preserves_date() {
        let d = date(2025, 3, 15);
        assert_eq!(date_from_timestamp(local_midnight(d)), d);
    }
}
