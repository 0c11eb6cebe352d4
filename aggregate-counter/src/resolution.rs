use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar;
use crate::error::CounterError;

/// The calendar granularity of a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Day => "day",
            Resolution::Month => "month",
            Resolution::Year => "year",
        }
    }

    /// Moves `at` back by `units` of this resolution.
    pub fn minus(&self, at: DateTime<Utc>, units: u32) -> Result<DateTime<Utc>, CounterError> {
        let units = -i64::from(units);
        match self {
            Resolution::Minute => calendar::add_minutes(at, units),
            Resolution::Hour => calendar::add_hours(at, units),
            Resolution::Day => calendar::add_days(at, units),
            Resolution::Month => calendar::add_months(at, units),
            Resolution::Year => calendar::add_months(at, units * 12),
        }
    }

    /// Start of the unit containing `at`.
    pub fn floor(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Resolution::Minute => calendar::floor_minute(at),
            Resolution::Hour => calendar::floor_hour(at),
            Resolution::Day => calendar::floor_day(at),
            Resolution::Month => calendar::floor_month(at),
            Resolution::Year => calendar::floor_year(at),
        }
    }

    /// Start of the unit following the one that starts at `unit_start`.
    pub fn next(&self, unit_start: DateTime<Utc>) -> Result<DateTime<Utc>, CounterError> {
        match self {
            Resolution::Minute => calendar::add_minutes(unit_start, 1),
            Resolution::Hour => calendar::add_hours(unit_start, 1),
            Resolution::Day => calendar::add_days(unit_start, 1),
            Resolution::Month => calendar::add_months(unit_start, 1),
            Resolution::Year => calendar::add_months(unit_start, 12),
        }
    }

    /// Number of units of this resolution touched by the inclusive range `[start, end]`.
    pub fn units_spanned(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let between = match self {
            Resolution::Minute => calendar::minutes_between(start, end),
            Resolution::Hour => calendar::hours_between(start, end),
            Resolution::Day => calendar::days_between(start, end),
            Resolution::Month => calendar::months_between(start, end),
            Resolution::Year => calendar::years_between(start, end),
        };
        between + 1
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseResolutionError(pub String);

impl fmt::Display for ParseResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is not a valid resolution", self.0)
    }
}

impl std::error::Error for ParseResolutionError {}

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minute" => Ok(Resolution::Minute),
            "hour" => Ok(Resolution::Hour),
            "day" => Ok(Resolution::Day),
            "month" => Ok(Resolution::Month),
            "year" => Ok(Resolution::Year),
            _ => Err(ParseResolutionError(s.to_owned())),
        }
    }
}
