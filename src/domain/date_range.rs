//! Calendar grid ranges.
//!
//! The grid is always made of whole weeks starting on Sunday, so the visible
//! range is wider than the statistics window: it is padded backwards to the
//! Sunday on or before the window start and forwards to the Saturday on or
//! after the window end. Padding days after today are shown but not editable.

use crate::domain::models::SickDayRecord;
use crate::domain::window::Window;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    Rolling12Months,
    Year(i32),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GridModeError {
    #[error("unknown mode {0:?}")]
    UnknownMode(String),
    #[error("year {0} is out of range")]
    InvalidYear(i32),
}

impl GridMode {
    /// Resolves `?mode=...&year=...` query parameters. A bare `year` implies year mode,
    /// and year mode without a year means the current one.
    pub fn from_params(
        mode: Option<&str>,
        year: Option<i32>,
        today: NaiveDate,
    ) -> Result<Self, GridModeError> {
        let mode = match mode.map(|m| m.trim().to_lowercase()) {
            None => {
                if let Some(year) = year {
                    GridMode::Year(year)
                } else {
                    GridMode::Rolling12Months
                }
            }
            Some(raw) => match raw.as_str() {
                "" | "rolling" | "rolling12" | "rolling_12_months" | "12m" => {
                    GridMode::Rolling12Months
                }
                "year" | "calendar" => GridMode::Year(year.unwrap_or_else(|| today.year())),
                _ => return Err(GridModeError::UnknownMode(raw)),
            },
        };

        if let GridMode::Year(year) = mode {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(GridModeError::InvalidYear(year));
            }
        }
        Ok(mode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GridMode::Rolling12Months => "rolling",
            GridMode::Year(_) => "year",
        }
    }

    /// The window statistics and queries use for this mode, without week padding.
    pub fn window(&self, today: NaiveDate) -> Result<Window, GridModeError> {
        match *self {
            GridMode::Rolling12Months => Ok(Window::rolling_12_months(today)),
            GridMode::Year(year) => Window::year(year).ok_or(GridModeError::InvalidYear(year)),
        }
    }
}

/// Every date shown on the grid for `mode`, oldest first. The length is always a
/// multiple of seven.
pub fn generate(mode: GridMode, today: NaiveDate) -> Result<Vec<NaiveDate>, GridModeError> {
    let window = mode.window(today)?;
    let (start, end) = week_aligned(&window);
    let span = (end - start).num_days();
    Ok((0..=span).map(|offset| start + Duration::days(offset)).collect())
}

/// Extends a window back to Sunday and forward to Saturday.
fn week_aligned(window: &Window) -> (NaiveDate, NaiveDate) {
    let lead = i64::from(window.start.weekday().num_days_from_sunday());
    let trail = 6 - i64::from(window.end.weekday().num_days_from_sunday());
    (
        window.start - Duration::days(lead),
        window.end + Duration::days(trail),
    )
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GridCell {
    pub date: NaiveDate,
    pub intensity: i16,
    /// False for days after today.
    pub editable: bool,
    /// False for week padding outside the statistics window.
    pub in_window: bool,
}

pub fn build_grid(
    dates: &[NaiveDate],
    records: &[SickDayRecord],
    window: &Window,
    today: NaiveDate,
) -> Vec<GridCell> {
    let by_date: HashMap<NaiveDate, i16> = records.iter().map(|r| (r.date, r.intensity)).collect();

    dates
        .iter()
        .map(|&date| GridCell {
            date,
            intensity: by_date.get(&date).copied().unwrap_or(0),
            editable: date <= today,
            in_window: window.contains(date),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_gap_free(dates: &[NaiveDate]) {
        for pair in dates.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_days(), 1);
        }
    }

    #[test]
    fn test_rolling_grid_is_whole_weeks() {
        let today = date(2024, 3, 15); // Friday
        let dates = generate(GridMode::Rolling12Months, today).unwrap();

        assert_eq!(dates.len() % 7, 0);
        assert_eq!(dates.len(), 371);
        assert_eq!(dates[0], date(2023, 3, 12));
        assert_eq!(dates[0].weekday(), Weekday::Sun);
        assert_eq!(*dates.last().unwrap(), date(2024, 3, 16));
        assert_eq!(dates.last().unwrap().weekday(), Weekday::Sat);
        assert!(dates.contains(&today));
        assert_gap_free(&dates);
    }

    #[test]
    fn test_rolling_grid_on_saturday_needs_no_padding() {
        let today = date(2024, 3, 16); // Saturday
        let dates = generate(GridMode::Rolling12Months, today).unwrap();
        assert_eq!(*dates.last().unwrap(), today);
        assert_eq!(dates.len() % 7, 0);
    }

    #[test]
    fn test_year_grid_pads_both_ends() {
        let today = date(2024, 6, 1);
        let dates = generate(GridMode::Year(2024), today).unwrap();

        assert_eq!(dates[0], date(2023, 12, 31));
        assert_eq!(*dates.last().unwrap(), date(2025, 1, 4));
        assert_eq!(dates.len(), 371);
        assert_gap_free(&dates);
    }

    #[test]
    fn test_year_grid_starting_on_sunday() {
        // Jan 1 2023 is a Sunday, Dec 31 2023 is a Sunday.
        let dates = generate(GridMode::Year(2023), date(2024, 6, 1)).unwrap();
        assert_eq!(dates[0], date(2023, 1, 1));
        assert_eq!(*dates.last().unwrap(), date(2024, 1, 6));
        assert_eq!(dates.len() % 7, 0);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let today = date(2025, 2, 28);
        assert_eq!(
            generate(GridMode::Rolling12Months, today).unwrap(),
            generate(GridMode::Rolling12Months, today).unwrap()
        );
    }

    #[test]
    fn test_mode_from_params() {
        let today = date(2024, 3, 15);
        assert_eq!(
            GridMode::from_params(None, None, today),
            Ok(GridMode::Rolling12Months)
        );
        assert_eq!(
            GridMode::from_params(Some("Rolling"), Some(2020), today),
            Ok(GridMode::Rolling12Months)
        );
        assert_eq!(
            GridMode::from_params(Some("year"), None, today),
            Ok(GridMode::Year(2024))
        );
        assert_eq!(
            GridMode::from_params(None, Some(2022), today),
            Ok(GridMode::Year(2022))
        );
        assert_eq!(
            GridMode::from_params(Some("weekly"), None, today),
            Err(GridModeError::UnknownMode("weekly".to_string()))
        );
        assert_eq!(
            GridMode::from_params(Some("year"), Some(-5), today),
            Err(GridModeError::InvalidYear(-5))
        );
    }

    #[test]
    fn test_build_grid_marks_future_and_padding() {
        let today = date(2024, 3, 15);
        let mode = GridMode::Rolling12Months;
        let window = mode.window(today).unwrap();
        let dates = generate(mode, today).unwrap();
        let records = vec![
            SickDayRecord::new(date(2024, 3, 14), 3),
            SickDayRecord::new(date(2024, 3, 15), 0),
        ];

        let grid = build_grid(&dates, &records, &window, today);
        assert_eq!(grid.len(), dates.len());

        let first = &grid[0];
        assert!(!first.in_window);
        assert!(first.editable);

        let yesterday = grid.iter().find(|c| c.date == date(2024, 3, 14)).unwrap();
        assert_eq!(yesterday.intensity, 3);
        assert!(yesterday.in_window);

        let last = grid.last().unwrap();
        assert_eq!(last.date, date(2024, 3, 16));
        assert!(!last.editable);
        assert!(!last.in_window);
        assert_eq!(last.intensity, 0);
    }
}
