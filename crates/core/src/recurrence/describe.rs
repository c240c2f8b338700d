//! Human-readable recurrence summaries.
//!
//! Presentation helper only; nothing here participates in scheduling
//! decisions.

use chrono::Weekday;

use bookline_domain::{RecurrencePattern, RecurrenceRule};

/// Summarize a pattern's cadence for display, e.g.
/// `"Every Monday, Wednesday at 10:00 (6 occurrences)"`.
pub fn describe(pattern: &RecurrencePattern) -> String {
    let time = pattern.start_time.format("%H:%M");
    let cadence = match &pattern.rule {
        RecurrenceRule::Daily => format!("Every day at {time}"),
        RecurrenceRule::Weekly { days_of_week } => {
            format!("Every {} at {time}", weekday_list(days_of_week))
        }
        RecurrenceRule::Biweekly { days_of_week } => {
            format!("Every other week on {} at {time}", weekday_list(days_of_week))
        }
        RecurrenceRule::Monthly { day_of_month } => {
            format!("Monthly on day {day_of_month} at {time}")
        }
        RecurrenceRule::Custom { interval_days } => {
            if *interval_days == 1 {
                format!("Every day at {time}")
            } else {
                format!("Every {interval_days} days at {time}")
            }
        }
    };

    let mut summary = cadence;
    if let Some(limit) = pattern.occurrence_limit {
        summary.push_str(&format!(" ({limit} occurrences)"));
    }
    if let Some(end) = pattern.end_date {
        summary.push_str(&format!(" until {end}"));
    }
    summary
}

fn weekday_list(days: &[Weekday]) -> String {
    let names: Vec<&str> = days.iter().map(|day| weekday_name(*day)).collect();
    names.join(", ")
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
