//! Sick day statistics.
//!
//! Everything here is a pure function of (records, window, today). Year views and
//! rolling views share the same code path; a year is just a `[Jan 1, Dec 31]` window.

use crate::domain::models::{is_valid_intensity, SickDayRecord};
use crate::domain::window::Window;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// `mostCommonDay` when there are no sick days in the window.
pub const NO_COMMON_DAY: &str = "None";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StatsError {
    #[error("window end {end} precedes start {start}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
    #[error("intensity {intensity} on {date} is outside 0..=4")]
    InvalidIntensity { date: NaiveDate, intensity: i16 },
    #[error("year {0} has no calendar window")]
    InvalidYear(i32),
}

/// Field names are part of the JSON contract with the frontend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_sick_days: u32,
    pub percentage_of_year: f64,
    pub year_to_date_percentage: f64,
    pub average_intensity: f64,
    pub most_common_day: String,
    pub recovery_rate: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub average_sick_streak: f64,
}

#[derive(Debug, Default, PartialEq)]
struct StreakSummary {
    lengths: Vec<u32>,
    /// Full non-sick days between consecutive streaks.
    recovery_periods: Vec<i64>,
}

/// Computes stats for the calendar year `year`.
pub fn compute_for_year(
    records: &[SickDayRecord],
    year: i32,
    today: NaiveDate,
) -> Result<UserStats, StatsError> {
    let window = Window::year(year).ok_or(StatsError::InvalidYear(year))?;
    compute(records, &window, today)
}

/// Computes stats over `window`.
///
/// Any record outside 0..=4 rejects the whole input. Records with intensity 0
/// never count. `yearToDatePercentage` looks at every supplied record in
/// `[Jan 1, today]`, so callers that want it populated must pass records
/// covering that range too.
pub fn compute(
    records: &[SickDayRecord],
    window: &Window,
    today: NaiveDate,
) -> Result<UserStats, StatsError> {
    if window.end < window.start {
        return Err(StatsError::InvalidWindow {
            start: window.start,
            end: window.end,
        });
    }
    if let Some(bad) = records.iter().find(|r| !is_valid_intensity(r.intensity)) {
        return Err(StatsError::InvalidIntensity {
            date: bad.date,
            intensity: bad.intensity,
        });
    }

    let mut sick_days: Vec<&SickDayRecord> = records
        .iter()
        .filter(|r| r.is_sick() && window.contains(r.date))
        .collect();
    sick_days.sort_by_key(|r| r.date);

    let total_sick_days = sick_days.len() as u32;
    let percentage_of_year = percentage(sick_days.len(), window.length_days());

    let ytd = Window::year_to_date(today);
    let ytd_sick_days = records
        .iter()
        .filter(|r| r.is_sick() && ytd.contains(r.date))
        .count();
    let year_to_date_percentage = percentage(ytd_sick_days, ytd.length_days());

    let dates: Vec<NaiveDate> = sick_days.iter().map(|r| r.date).collect();
    let most_common_day = most_common_day(&dates).to_string();

    let summary = detect_streaks(&dates);
    let longest_streak = summary.lengths.iter().copied().max().unwrap_or(0);
    let average_sick_streak = round2(mean(summary.lengths.iter().map(|&l| f64::from(l))));
    let recovery_rate = round2(mean(summary.recovery_periods.iter().map(|&p| p as f64)));

    let current_streak = match (dates.last(), summary.lengths.last()) {
        (Some(&last), Some(&length)) if matches!((today - last).num_days(), 0 | 1) => length,
        _ => 0,
    };

    let average_intensity = round2(mean(sick_days.iter().map(|r| f64::from(r.intensity))));

    tracing::debug!(
        "Computed stats for {}..={}: {} sick days, {} streaks",
        window.start,
        window.end,
        total_sick_days,
        summary.lengths.len()
    );

    Ok(UserStats {
        total_sick_days,
        percentage_of_year,
        year_to_date_percentage,
        average_intensity,
        most_common_day,
        recovery_rate,
        current_streak,
        longest_streak,
        average_sick_streak,
    })
}

/// Walks ascending dates. A one day step extends the running streak; any other
/// step closes it, and steps wider than one day also record a recovery period.
fn detect_streaks(sorted: &[NaiveDate]) -> StreakSummary {
    let mut summary = StreakSummary::default();
    let Some((&first, rest)) = sorted.split_first() else {
        return summary;
    };

    let mut previous = first;
    let mut running = 1u32;
    for &date in rest {
        let gap = (date - previous).num_days();
        if gap == 1 {
            running += 1;
        } else {
            summary.lengths.push(running);
            if gap > 1 {
                summary.recovery_periods.push(gap - 1);
            }
            running = 1;
        }
        previous = date;
    }
    summary.lengths.push(running);
    summary
}

/// Ties go to the earliest weekday, Sunday first.
fn most_common_day(dates: &[NaiveDate]) -> &'static str {
    if dates.is_empty() {
        return NO_COMMON_DAY;
    }

    let mut buckets = [0usize; 7];
    for date in dates {
        buckets[date.weekday().num_days_from_sunday() as usize] += 1;
    }

    let mut best = 0;
    for (index, &count) in buckets.iter().enumerate() {
        if count > buckets[best] {
            best = index;
        }
    }
    WEEKDAY_NAMES[best]
}

fn percentage(count: usize, days: i64) -> f64 {
    if days <= 0 {
        return 0.0;
    }
    round2(count as f64 / days as f64 * 100.0)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Two decimal places, halves rounded away from zero (`f64::round`).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
