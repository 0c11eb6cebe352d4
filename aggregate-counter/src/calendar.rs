//! UTC calendar arithmetic used by the key generator and the range resolver.
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};

use crate::error::CounterError;

pub fn floor_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    let minute_of_day = i64::from(at.hour() * 60 + at.minute());
    at.date_naive()
        .and_time(NaiveTime::MIN + TimeDelta::minutes(minute_of_day))
        .and_utc()
}

pub fn floor_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_time(NaiveTime::MIN + TimeDelta::hours(i64::from(at.hour())))
        .and_utc()
}

pub fn floor_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

pub fn floor_month(at: DateTime<Utc>) -> DateTime<Utc> {
    month_start(at.date_naive()).and_time(NaiveTime::MIN).and_utc()
}

pub fn floor_year(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    (date - Days::new(u64::from(date.ordinal0())))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// Number of days (28-31) in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> usize {
    let first = month_start(date);
    match first.checked_add_months(Months::new(1)) {
        Some(next) => usize::try_from((next - first).num_days()).unwrap_or(31),
        // Only December of the last representable year gets here
        None => 31,
    }
}

pub fn add_hours(at: DateTime<Utc>, hours: i64) -> Result<DateTime<Utc>, CounterError> {
    TimeDelta::try_hours(hours)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or(CounterError::OutOfRange(at))
}

pub fn add_days(at: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>, CounterError> {
    TimeDelta::try_days(days)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or(CounterError::OutOfRange(at))
}

pub fn add_minutes(at: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, CounterError> {
    TimeDelta::try_minutes(minutes)
        .and_then(|delta| at.checked_add_signed(delta))
        .ok_or(CounterError::OutOfRange(at))
}

/// Shifts by whole calendar months, clamping the day of month where needed.
pub fn add_months(at: DateTime<Utc>, months: i64) -> Result<DateTime<Utc>, CounterError> {
    let shifted = match u32::try_from(months.unsigned_abs()) {
        Ok(n) if months >= 0 => at.checked_add_months(Months::new(n)),
        Ok(n) => at.checked_sub_months(Months::new(n)),
        Err(_) => None,
    };
    shifted.ok_or(CounterError::OutOfRange(at))
}

pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (floor_minute(end) - floor_minute(start)).num_minutes()
}

pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (floor_hour(end) - floor_hour(start)).num_hours()
}

pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (floor_day(end) - floor_day(start)).num_days()
}

pub fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let months = |at: DateTime<Utc>| i64::from(at.year()) * 12 + i64::from(at.month0());
    months(end) - months(start)
}

pub fn years_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    i64::from(end.year()) - i64::from(start.year())
}
