//! Recurrence rules and pattern lifecycle state

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BooklineError, Result};

/// Description of when a series repeats.
///
/// Each variant carries exactly the fields its cadence needs, so a malformed
/// combination (a monthly rule with weekdays, say) cannot be represented.
/// The one remaining runtime check is [`RecurrenceRule::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecurrenceRule {
    /// Every day.
    Daily,
    /// Selected weekdays, every week.
    Weekly { days_of_week: Vec<Weekday> },
    /// Selected weekdays, every other week, anchored to the start date's week.
    Biweekly { days_of_week: Vec<Weekday> },
    /// Once per month on a fixed day, clipped to the month's length.
    Monthly { day_of_month: u8 },
    /// Every `interval_days` days from the start date.
    Custom { interval_days: u32 },
}

impl RecurrenceRule {
    /// Reject malformed rule fields before any generation happens.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Daily => Ok(()),
            Self::Weekly { days_of_week } | Self::Biweekly { days_of_week } => {
                if days_of_week.is_empty() {
                    return Err(BooklineError::InvalidPatternDefinition(
                        "weekly rule requires at least one weekday".to_string(),
                    ));
                }
                Ok(())
            }
            Self::Monthly { day_of_month } => {
                if !(1..=31).contains(day_of_month) {
                    return Err(BooklineError::InvalidPatternDefinition(format!(
                        "day of month must be within 1..=31, got {day_of_month}"
                    )));
                }
                Ok(())
            }
            Self::Custom { interval_days } => {
                if *interval_days < 1 {
                    return Err(BooklineError::InvalidPatternDefinition(
                        "custom interval must be at least one day".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Whether `date` lies on this rule's cadence relative to `anchor`.
    pub fn matches_cadence(&self, anchor: NaiveDate, date: NaiveDate) -> bool {
        if date < anchor {
            return false;
        }
        match self {
            Self::Daily => true,
            Self::Weekly { days_of_week } => days_of_week.contains(&date.weekday()),
            Self::Biweekly { days_of_week } => {
                days_of_week.contains(&date.weekday()) && on_even_week(anchor, date)
            }
            Self::Monthly { day_of_month } => {
                let clipped = u32::from(*day_of_month).min(days_in_month(date.year(), date.month()));
                date.day() == clipped
            }
            Self::Custom { interval_days } => {
                (date - anchor).num_days() % i64::from(*interval_days) == 0
            }
        }
    }
}

/// Monday-based start of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Whether `date` falls on an even week offset from `anchor`'s week.
pub fn on_even_week(anchor: NaiveDate, date: NaiveDate) -> bool {
    let weeks = (week_start(date) - week_start(anchor)).num_days() / 7;
    weeks % 2 == 0
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| next.pred_opt())
        .map_or(28, |last| last.day())
}

/// Lifecycle state of a recurrence pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    Active,
    Paused,
    Cancelled,
    Completed,
}

impl PatternStatus {
    /// Cancelled and completed patterns accept no further operations.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for PatternStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternStatus {
    type Err = BooklineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(BooklineError::Persistence(format!("unknown pattern status: {other}"))),
        }
    }
}

/// Generation counters stored on the pattern record.
///
/// Canonically derivable from the occurrence log (created = scheduled +
/// completed rows, skipped = skipped rows); persisted alongside status so
/// the two can be reconciled if they ever diverge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCounters {
    pub created: u32,
    pub skipped: u32,
}

/// A recurrence rule plus the lifecycle state of its series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub id: Uuid,
    /// The bookable resource the series belongs to.
    pub resource_id: Uuid,
    pub owner_id: Uuid,
    pub rule: RecurrenceRule,
    /// Anchor date all cadence offsets are computed from.
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// Local time-of-day each slot starts at, in `timezone`.
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    pub timezone: Tz,
    pub occurrence_limit: Option<u32>,
    pub status: PatternStatus,
    pub created_occurrences: u32,
    pub skipped_occurrences: u32,
}

impl RecurrencePattern {
    /// Create an active pattern with zeroed counters.
    pub fn new(
        resource_id: Uuid,
        owner_id: Uuid,
        rule: RecurrenceRule,
        start_date: NaiveDate,
        start_time: NaiveTime,
        duration_minutes: u32,
        timezone: Tz,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id,
            owner_id,
            rule,
            start_date,
            end_date: None,
            start_time,
            duration_minutes,
            timezone,
            occurrence_limit: None,
            status: PatternStatus::Active,
            created_occurrences: 0,
            skipped_occurrences: 0,
        }
    }

    /// Bound the series by a final local date (inclusive).
    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    /// Bound the series by a total occurrence count.
    pub fn with_occurrence_limit(mut self, limit: u32) -> Self {
        self.occurrence_limit = Some(limit);
        self
    }

    /// Validate the rule and the pattern-level fields together.
    pub fn validate(&self) -> Result<()> {
        self.rule.validate()?;
        if self.duration_minutes == 0 {
            return Err(BooklineError::InvalidPatternDefinition(
                "duration must be at least one minute".to_string(),
            ));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(BooklineError::InvalidPatternDefinition(
                    "end date precedes start date".to_string(),
                ));
            }
        }
        if self.occurrence_limit == Some(0) {
            return Err(BooklineError::InvalidPatternDefinition(
                "occurrence limit must be at least one".to_string(),
            ));
        }
        Ok(())
    }

    /// Occurrences still available under the limit, if the series is bounded.
    pub fn remaining_capacity(&self) -> Option<u32> {
        self.occurrence_limit.map(|limit| limit.saturating_sub(self.created_occurrences))
    }

    pub fn counters(&self) -> PatternCounters {
        PatternCounters { created: self.created_occurrences, skipped: self.skipped_occurrences }
    }

    /// Local calendar date of an absolute instant in this pattern's timezone.
    pub fn local_date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn weekly_rule_rejects_empty_days() {
        let rule = RecurrenceRule::Weekly { days_of_week: vec![] };
        assert!(matches!(
            rule.validate(),
            Err(BooklineError::InvalidPatternDefinition(_))
        ));
    }

    #[test]
    fn monthly_rule_rejects_day_out_of_range() {
        assert!(RecurrenceRule::Monthly { day_of_month: 0 }.validate().is_err());
        assert!(RecurrenceRule::Monthly { day_of_month: 32 }.validate().is_err());
        assert!(RecurrenceRule::Monthly { day_of_month: 31 }.validate().is_ok());
    }

    #[test]
    fn custom_rule_rejects_zero_interval() {
        assert!(RecurrenceRule::Custom { interval_days: 0 }.validate().is_err());
    }

    #[test]
    fn weekly_cadence_matches_selected_weekdays() {
        let rule = RecurrenceRule::Weekly { days_of_week: vec![Weekday::Mon, Weekday::Wed] };
        let anchor = date(2025, 1, 6); // Monday
        assert!(rule.matches_cadence(anchor, date(2025, 1, 6)));
        assert!(rule.matches_cadence(anchor, date(2025, 1, 8)));
        assert!(!rule.matches_cadence(anchor, date(2025, 1, 7)));
        // nothing before the anchor
        assert!(!rule.matches_cadence(anchor, date(2024, 12, 30)));
    }

    #[test]
    fn biweekly_cadence_skips_odd_weeks() {
        let rule = RecurrenceRule::Biweekly { days_of_week: vec![Weekday::Mon] };
        let anchor = date(2025, 1, 6);
        assert!(rule.matches_cadence(anchor, date(2025, 1, 6)));
        assert!(!rule.matches_cadence(anchor, date(2025, 1, 13)));
        assert!(rule.matches_cadence(anchor, date(2025, 1, 20)));
    }

    #[test]
    fn monthly_cadence_clips_to_month_length() {
        let rule = RecurrenceRule::Monthly { day_of_month: 31 };
        let anchor = date(2025, 1, 31);
        assert!(rule.matches_cadence(anchor, date(2025, 2, 28)));
        assert!(!rule.matches_cadence(anchor, date(2025, 2, 27)));
        assert!(rule.matches_cadence(anchor, date(2025, 3, 31)));
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(2025, 4), 30);
        assert_eq!(days_in_month(2025, 12), 31);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PatternStatus::Active,
            PatternStatus::Paused,
            PatternStatus::Cancelled,
            PatternStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<PatternStatus>().unwrap(), status);
        }
        assert!("archived".parse::<PatternStatus>().is_err());
    }

    #[test]
    fn pattern_validation_covers_field_bounds() {
        let mut pattern = RecurrencePattern::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            RecurrenceRule::Daily,
            date(2025, 1, 6),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            60,
            chrono_tz::UTC,
        );
        assert!(pattern.validate().is_ok());

        pattern.duration_minutes = 0;
        assert!(pattern.validate().is_err());
        pattern.duration_minutes = 60;

        pattern.end_date = Some(date(2025, 1, 1));
        assert!(pattern.validate().is_err());
        pattern.end_date = None;

        pattern.occurrence_limit = Some(0);
        assert!(pattern.validate().is_err());
    }

    #[test]
    fn remaining_capacity_saturates() {
        let mut pattern = RecurrencePattern::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            RecurrenceRule::Daily,
            date(2025, 1, 6),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            30,
            chrono_tz::UTC,
        )
        .with_occurrence_limit(3);

        assert_eq!(pattern.remaining_capacity(), Some(3));
        pattern.created_occurrences = 5;
        assert_eq!(pattern.remaining_capacity(), Some(0));
    }
}
