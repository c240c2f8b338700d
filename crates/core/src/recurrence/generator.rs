//! Pure candidate generation for recurrence patterns.
//!
//! Generation is side-effect free: it derives candidate slots from a pattern
//! and leaves conflict checking and persistence to the lifecycle layer.
//!
//! Wall-clock semantics are deliberate. A 10:00 slot stays 10:00 local across
//! a DST transition even though the absolute UTC span shifts; the instants
//! are resolved per candidate date in the pattern's timezone, never by adding
//! fixed UTC offsets.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
             Weekday};
use chrono_tz::Tz;

use bookline_domain::{days_in_month, on_even_week, RecurrencePattern, RecurrenceRule, Result};

/// One candidate slot produced by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSlot {
    /// Local calendar date the slot falls on, in the pattern's timezone.
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Generate up to `max_count` candidate slots, strictly after the local date
/// `after` when given, otherwise from the anchor date onward.
///
/// Stop conditions, first hit wins: the remaining occurrence capacity, the
/// pattern's end date, the requested count. Candidates come back strictly
/// increasing with no duplicates.
///
/// # Errors
/// `InvalidPatternDefinition` for malformed rule fields, raised before any
/// generation.
pub fn generate(
    pattern: &RecurrencePattern,
    after: Option<NaiveDate>,
    max_count: usize,
) -> Result<Vec<CandidateSlot>> {
    pattern.rule.validate()?;

    let cap = match pattern.remaining_capacity() {
        Some(remaining) => max_count.min(remaining as usize),
        None => max_count,
    };
    if cap == 0 {
        return Ok(Vec::new());
    }

    let floor = match after {
        Some(date) => pattern.start_date.max(date + Duration::days(1)),
        None => pattern.start_date,
    };

    let mut cursor = DateCursor::new(&pattern.rule, pattern.start_date, floor);
    let mut slots = Vec::with_capacity(cap);
    while slots.len() < cap {
        let Some(date) = cursor.advance() else { break };
        if pattern.end_date.is_some_and(|end| date > end) {
            break;
        }
        let Some(start) = resolve_local(pattern.timezone, date.and_time(pattern.start_time))
        else {
            // Spring-forward gap: the local start does not exist on this date.
            continue;
        };
        let wall_end =
            date.and_time(pattern.start_time) + Duration::minutes(i64::from(pattern.duration_minutes));
        let end = resolve_local(pattern.timezone, wall_end)
            .unwrap_or_else(|| start + Duration::minutes(i64::from(pattern.duration_minutes)));
        slots.push(CandidateSlot { date, start, end });
    }

    Ok(slots)
}

/// Resolve a naive local datetime in `tz` to an absolute instant.
///
/// Ambiguous local times (fall-back hour) take the earlier instant;
/// nonexistent local times resolve to `None`.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(instant) => Some(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Stateful date stepper over one rule's cadence.
enum DateCursor {
    Daily { next: NaiveDate },
    Weekdays { next: NaiveDate, days: Vec<Weekday>, anchor: NaiveDate, biweekly: bool },
    Monthly { year: i32, month: u32, day_of_month: u8, floor: NaiveDate },
    Custom { next: NaiveDate, step: i64 },
}

impl DateCursor {
    fn new(rule: &RecurrenceRule, anchor: NaiveDate, floor: NaiveDate) -> Self {
        match rule {
            RecurrenceRule::Daily => Self::Daily { next: floor },
            RecurrenceRule::Weekly { days_of_week } => Self::Weekdays {
                next: floor,
                days: days_of_week.clone(),
                anchor,
                biweekly: false,
            },
            RecurrenceRule::Biweekly { days_of_week } => Self::Weekdays {
                next: floor,
                days: days_of_week.clone(),
                anchor,
                biweekly: true,
            },
            RecurrenceRule::Monthly { day_of_month } => Self::Monthly {
                year: floor.year(),
                month: floor.month(),
                day_of_month: *day_of_month,
                floor,
            },
            RecurrenceRule::Custom { interval_days } => {
                let step = i64::from(*interval_days);
                let gap = (floor - anchor).num_days();
                let multiples = (gap + step - 1).div_euclid(step);
                Self::Custom { next: anchor + Duration::days(multiples * step), step }
            }
        }
    }

    fn advance(&mut self) -> Option<NaiveDate> {
        match self {
            Self::Daily { next } => {
                let date = *next;
                *next = date + Duration::days(1);
                Some(date)
            }
            Self::Weekdays { next, days, anchor, biweekly } => loop {
                let date = *next;
                *next = date + Duration::days(1);
                if !days.contains(&date.weekday()) {
                    continue;
                }
                if *biweekly && !on_even_week(*anchor, date) {
                    continue;
                }
                return Some(date);
            },
            Self::Monthly { year, month, day_of_month, floor } => loop {
                let day = u32::from(*day_of_month).min(days_in_month(*year, *month));
                let candidate = NaiveDate::from_ymd_opt(*year, *month, day)?;
                if *month == 12 {
                    *month = 1;
                    *year += 1;
                } else {
                    *month += 1;
                }
                if candidate < *floor {
                    continue;
                }
                return Some(candidate);
            },
            Self::Custom { next, step } => {
                let date = *next;
                *next = date + Duration::days(*step);
                Some(date)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use chrono_tz::America::New_York;
    use chrono_tz::UTC;
    use uuid::Uuid;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn pattern(rule: RecurrenceRule, anchor: NaiveDate, tz: Tz) -> RecurrencePattern {
        RecurrencePattern::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            rule,
            anchor,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            60,
            tz,
        )
    }

    fn dates(slots: &[CandidateSlot]) -> Vec<NaiveDate> {
        slots.iter().map(|slot| slot.date).collect()
    }

    #[test]
    fn weekly_generates_on_selected_weekdays() {
        let p = pattern(
            RecurrenceRule::Weekly {
                days_of_week: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
            },
            date(2025, 1, 6),
            UTC,
        )
        .with_occurrence_limit(6);

        let slots = generate(&p, None, 10).unwrap();
        assert_eq!(
            dates(&slots),
            vec![
                date(2025, 1, 6),
                date(2025, 1, 8),
                date(2025, 1, 10),
                date(2025, 1, 13),
                date(2025, 1, 15),
                date(2025, 1, 17),
            ]
        );
    }

    #[test]
    fn monthly_clips_day_to_month_length() {
        let p = pattern(RecurrenceRule::Monthly { day_of_month: 31 }, date(2025, 1, 31), UTC);

        let slots = generate(&p, None, 3).unwrap();
        assert_eq!(
            dates(&slots),
            vec![date(2025, 1, 31), date(2025, 2, 28), date(2025, 3, 31)]
        );
    }

    #[test]
    fn monthly_skips_cadence_day_before_anchor() {
        let p = pattern(RecurrenceRule::Monthly { day_of_month: 10 }, date(2025, 1, 15), UTC);

        let slots = generate(&p, None, 2).unwrap();
        assert_eq!(dates(&slots), vec![date(2025, 2, 10), date(2025, 3, 10)]);
    }

    #[test]
    fn biweekly_skips_odd_weeks() {
        let p = pattern(
            RecurrenceRule::Biweekly { days_of_week: vec![Weekday::Mon] },
            date(2025, 1, 6),
            UTC,
        );

        let slots = generate(&p, None, 3).unwrap();
        assert_eq!(
            dates(&slots),
            vec![date(2025, 1, 6), date(2025, 1, 20), date(2025, 2, 3)]
        );
    }

    #[test]
    fn custom_steps_by_interval_from_anchor() {
        let p = pattern(RecurrenceRule::Custom { interval_days: 10 }, date(2025, 1, 1), UTC);

        let slots = generate(&p, None, 3).unwrap();
        assert_eq!(
            dates(&slots),
            vec![date(2025, 1, 1), date(2025, 1, 11), date(2025, 1, 21)]
        );
    }

    #[test]
    fn custom_resumes_on_cadence_after_horizon() {
        let p = pattern(RecurrenceRule::Custom { interval_days: 10 }, date(2025, 1, 1), UTC);

        // Jan 15 is off-cadence; generation must resume at Jan 21, not Jan 16.
        let slots = generate(&p, Some(date(2025, 1, 15)), 2).unwrap();
        assert_eq!(dates(&slots), vec![date(2025, 1, 21), date(2025, 1, 31)]);
    }

    #[test]
    fn after_date_is_exclusive() {
        let p = pattern(RecurrenceRule::Daily, date(2025, 1, 1), UTC);

        let slots = generate(&p, Some(date(2025, 1, 5)), 2).unwrap();
        assert_eq!(dates(&slots), vec![date(2025, 1, 6), date(2025, 1, 7)]);
    }

    #[test]
    fn end_date_stops_generation() {
        let p = pattern(
            RecurrenceRule::Weekly { days_of_week: vec![Weekday::Mon, Weekday::Wed] },
            date(2025, 1, 6),
            UTC,
        )
        .with_end_date(date(2025, 1, 13));

        let slots = generate(&p, None, 10).unwrap();
        assert_eq!(
            dates(&slots),
            vec![date(2025, 1, 6), date(2025, 1, 8), date(2025, 1, 13)]
        );
    }

    #[test]
    fn remaining_capacity_caps_the_batch() {
        let mut p = pattern(RecurrenceRule::Daily, date(2025, 1, 1), UTC).with_occurrence_limit(6);
        p.created_occurrences = 4;

        let slots = generate(&p, None, 10).unwrap();
        assert_eq!(slots.len(), 2);
    }

    #[test]
    fn exhausted_capacity_yields_empty_batch() {
        let mut p = pattern(RecurrenceRule::Daily, date(2025, 1, 1), UTC).with_occurrence_limit(6);
        p.created_occurrences = 6;

        assert!(generate(&p, None, 10).unwrap().is_empty());
    }

    #[test]
    fn empty_weekday_set_fails_before_generation() {
        let p = pattern(RecurrenceRule::Weekly { days_of_week: vec![] }, date(2025, 1, 6), UTC);
        assert!(generate(&p, None, 5).is_err());
    }

    #[test]
    fn candidates_are_strictly_increasing() {
        let p = pattern(
            RecurrenceRule::Weekly {
                days_of_week: vec![Weekday::Tue, Weekday::Thu, Weekday::Sat],
            },
            date(2025, 1, 1),
            UTC,
        );

        let slots = generate(&p, None, 30).unwrap();
        assert_eq!(slots.len(), 30);
        for pair in slots.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn wall_clock_start_is_preserved_across_dst() {
        // DST begins 2025-03-09 in America/New_York: 10:00 local shifts from
        // 15:00Z (EST) to 14:00Z (EDT) while staying 10:00 on the wall.
        let p = pattern(RecurrenceRule::Daily, date(2025, 3, 8), New_York);

        let slots = generate(&p, None, 2).unwrap();
        assert_eq!(slots[0].start.to_rfc3339(), "2025-03-08T15:00:00+00:00");
        assert_eq!(slots[1].start.to_rfc3339(), "2025-03-09T14:00:00+00:00");
        // Wall-clock duration stays an hour on both sides of the transition.
        assert_eq!(slots[0].end - slots[0].start, Duration::minutes(60));
        assert_eq!(slots[1].end - slots[1].start, Duration::minutes(60));
    }

    #[test]
    fn nonexistent_local_start_skips_the_date() {
        // 02:30 does not exist on 2025-03-09 in America/New_York.
        let mut p = pattern(RecurrenceRule::Daily, date(2025, 3, 8), New_York);
        p.start_time = NaiveTime::from_hms_opt(2, 30, 0).unwrap();

        let slots = generate(&p, None, 2).unwrap();
        assert_eq!(dates(&slots), vec![date(2025, 3, 8), date(2025, 3, 10)]);
    }

    #[test]
    fn ambiguous_local_start_takes_earlier_instant() {
        // 01:30 occurs twice on 2025-11-02 in America/New_York; the EDT
        // reading (05:30Z) wins over the EST one (06:30Z).
        let mut p = pattern(RecurrenceRule::Daily, date(2025, 11, 2), New_York);
        p.start_time = NaiveTime::from_hms_opt(1, 30, 0).unwrap();

        let slots = generate(&p, None, 1).unwrap();
        assert_eq!(slots[0].start.to_rfc3339(), "2025-11-02T05:30:00+00:00");
    }
}
