use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

/// Timezone used to decide which calendar day "today" is.
///
/// Accepts IANA names (`Europe/Berlin`), `UTC`/`GMT`, and fixed offsets such as
/// `UTC+02:00`, `GMT-5` or `+0530`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AppTimezone {
    Named(Tz),
    Fixed(FixedOffset),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unrecognised timezone {0:?}")]
pub struct TimezoneError(pub String);

impl AppTimezone {
    pub fn utc() -> Self {
        AppTimezone::Named(Tz::UTC)
    }

    /// Local calendar date of `instant` in this timezone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            AppTimezone::Named(tz) => instant.with_timezone(tz).date_naive(),
            AppTimezone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(Utc::now())
    }
}

impl FromStr for AppTimezone {
    type Err = TimezoneError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let err = || TimezoneError(raw.to_string());
        if trimmed.is_empty() {
            return Err(err());
        }

        let upper = trimmed.to_uppercase();
        if upper == "UTC" || upper == "GMT" || upper == "Z" {
            return Ok(AppTimezone::utc());
        }
        if let Some(rest) = upper.strip_prefix("UTC").or_else(|| upper.strip_prefix("GMT")) {
            return parse_offset(rest).map(AppTimezone::Fixed).ok_or_else(err);
        }
        if trimmed.starts_with('+') || trimmed.starts_with('-') {
            return parse_offset(trimmed).map(AppTimezone::Fixed).ok_or_else(err);
        }

        let name = if trimmed == "Europe/Kiev" { "Europe/Kyiv" } else { trimmed };
        name.parse::<Tz>().map(AppTimezone::Named).map_err(|_| err())
    }
}

impl fmt::Display for AppTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppTimezone::Named(tz) => write!(f, "{}", tz.name()),
            AppTimezone::Fixed(offset) => write!(f, "UTC{offset}"),
        }
    }
}

/// `+5`, `-03:30`, `+0530`
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => return None,
    };
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if rest.len() > 2 => {
            let (h, m) = rest.split_at(rest.len() - 2);
            (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?)
        }
        None => (rest.parse::<i32>().ok()?, 0),
    };

    if !(0..=14).contains(&hours) || !(0..=59).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
