use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Highest intensity a user can record for a day. Zero means "no symptoms".
pub const MAX_INTENSITY: i16 = 4;

pub fn is_valid_intensity(value: i16) -> bool {
    (0..=MAX_INTENSITY).contains(&value)
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One stored day for one user. Records arrive already scoped to a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct SickDayRecord {
    pub date: NaiveDate,
    pub intensity: i16,
}

impl SickDayRecord {
    pub fn new(date: NaiveDate, intensity: i16) -> Self {
        Self { date, intensity }
    }

    pub fn is_sick(&self) -> bool {
        self.intensity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_bounds() {
        assert!(is_valid_intensity(0));
        assert!(is_valid_intensity(4));
        assert!(!is_valid_intensity(-1));
        assert!(!is_valid_intensity(5));
    }

    #[test]
    fn test_zero_intensity_is_not_sick() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(!SickDayRecord::new(date, 0).is_sick());
        assert!(SickDayRecord::new(date, 1).is_sick());
    }
}
