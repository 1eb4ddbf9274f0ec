use chrono::{Datelike, Duration, NaiveDate};

/// Days between the start and end of a rolling 12 month window.
pub const ROLLING_LOOKBACK_DAYS: i64 = 365;

/// Inclusive `[start, end]` range of calendar dates that statistics are computed over.
///
/// A window is not validated on construction; `analytics::stats::compute` rejects
/// windows whose end precedes their start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Jan 1 through Dec 31 of `year`, or `None` if chrono can't represent it.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self { start, end })
    }

    /// `[today - 365 days, today]`, which spans 366 calendar days.
    pub fn rolling_12_months(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(ROLLING_LOOKBACK_DAYS),
            end: today,
        }
    }

    /// Jan 1 of today's year through today.
    pub fn year_to_date(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(i64::from(today.ordinal0())),
            end: today,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Inclusive number of days. Only meaningful when `end >= start`.
    pub fn length_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Smallest window covering both `self` and `other`.
    pub fn union(&self, other: &Window) -> Window {
        Window {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_window_lengths() {
        assert_eq!(Window::year(2023).unwrap().length_days(), 365);
        assert_eq!(Window::year(2024).unwrap().length_days(), 366);
        assert_eq!(Window::year(1900).unwrap().length_days(), 365);
        assert_eq!(Window::year(2000).unwrap().length_days(), 366);
    }

    #[test]
    fn test_rolling_window_spans_366_days() {
        let window = Window::rolling_12_months(date(2024, 3, 15));
        assert_eq!(window.start, date(2023, 3, 16));
        assert_eq!(window.end, date(2024, 3, 15));
        assert_eq!(window.length_days(), 366);

        let window = Window::rolling_12_months(date(2023, 6, 1));
        assert_eq!(window.start, date(2022, 6, 1));
        assert_eq!(window.length_days(), 366);
    }

    #[test]
    fn test_year_to_date() {
        let window = Window::year_to_date(date(2024, 3, 1));
        assert_eq!(window.start, date(2024, 1, 1));
        assert_eq!(window.length_days(), 61);

        let window = Window::year_to_date(date(2024, 1, 1));
        assert_eq!(window.start, date(2024, 1, 1));
        assert_eq!(window.length_days(), 1);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let window = Window::range(date(2024, 1, 10), date(2024, 1, 20));
        assert!(window.contains(date(2024, 1, 10)));
        assert!(window.contains(date(2024, 1, 20)));
        assert!(!window.contains(date(2024, 1, 9)));
        assert!(!window.contains(date(2024, 1, 21)));
    }

    #[test]
    fn test_union() {
        let a = Window::range(date(2023, 3, 16), date(2024, 3, 15));
        let b = Window::year_to_date(date(2024, 3, 20));
        let merged = a.union(&b);
        assert_eq!(merged.start, date(2023, 3, 16));
        assert_eq!(merged.end, date(2024, 3, 20));
    }
}
