//! Range resolution: turning an arbitrary interval at a given resolution into a dense
//! series by stitching together the buckets one level coarser than the resolution.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use futures::future::try_join_all;
use tracing::debug;

use crate::aggregate::{AggregateCounter, Interval};
use crate::calendar;
use crate::dense::concat_slice;
use crate::error::CounterError;
use crate::keys::KeySpace;
use crate::resolution::Resolution;

/// A bucket that can be expanded into a dense array. Each one is named after the span it
/// covers, its slots are the next finer unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// 60 minute slots, 0-based
    Hour,
    /// 24 hour slots, 0-based
    Day,
    /// 28-31 day slots, field 1 is slot 0
    Month,
    /// 12 month slots, field 1 is slot 0
    Year,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Year, Bucket::Month, Bucket::Day, Bucket::Hour];

    pub fn slots(&self, at: DateTime<Utc>) -> usize {
        match self {
            Bucket::Hour => 60,
            Bucket::Day => 24,
            Bucket::Month => calendar::days_in_month(at.date_naive()),
            Bucket::Year => 12,
        }
    }

    pub fn unit_offset(&self) -> bool {
        matches!(self, Bucket::Month | Bucket::Year)
    }

    /// Zero-based slot that `at` falls into within its bucket.
    pub fn slot(&self, at: DateTime<Utc>) -> usize {
        let slot = match self {
            Bucket::Hour => at.minute(),
            Bucket::Day => at.hour(),
            Bucket::Month => at.day0(),
            Bucket::Year => at.month0(),
        };
        slot as usize
    }

    pub fn floor(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Bucket::Hour => calendar::floor_hour(at),
            Bucket::Day => calendar::floor_day(at),
            Bucket::Month => calendar::floor_month(at),
            Bucket::Year => calendar::floor_year(at),
        }
    }

    fn next(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, CounterError> {
        match self {
            Bucket::Hour => calendar::add_hours(start, 1),
            Bucket::Day => calendar::add_days(start, 1),
            Bucket::Month => calendar::add_months(start, 1),
            Bucket::Year => calendar::add_months(start, 12),
        }
    }

    /// The store key holding this bucket for `name` at `at`.
    pub fn key(&self, keys: &KeySpace, name: &str, at: DateTime<Utc>) -> String {
        let generator = keys.generator(name, at);
        match self {
            Bucket::Hour => generator.hour_key(),
            Bucket::Day => generator.day_key(),
            Bucket::Month => generator.month_key(),
            Bucket::Year => generator.year_key(),
        }
    }
}

/// Read access to the stored buckets of a counter.
#[async_trait]
pub trait BucketSource: Send + Sync {
    /// Dense counts of the bucket starting at `start`, exactly `bucket.slots(start)` long.
    async fn bucket_counts(
        &self,
        name: &str,
        bucket: Bucket,
        start: DateTime<Utc>,
    ) -> Result<Vec<i64>, CounterError>;

    /// The per-year counts of `name`, keyed by calendar year.
    async fn year_counts(&self, name: &str) -> Result<HashMap<i32, i64>, CounterError>;
}

pub async fn resolve<S>(
    source: &S,
    name: &str,
    interval: Interval,
    resolution: Resolution,
) -> Result<AggregateCounter, CounterError>
where
    S: BucketSource + ?Sized,
{
    let counts = match resolution {
        Resolution::Minute => stitch(source, name, Bucket::Hour, interval, resolution).await?,
        Resolution::Hour => stitch(source, name, Bucket::Day, interval, resolution).await?,
        Resolution::Day => stitch(source, name, Bucket::Month, interval, resolution).await?,
        Resolution::Month => stitch(source, name, Bucket::Year, interval, resolution).await?,
        Resolution::Year => {
            let years = source.year_counts(name).await?;
            (interval.start().year()..=interval.end().year())
                .map(|year| years.get(&year).copied().unwrap_or(0))
                .collect()
        }
    };

    debug!(
        counter = %name,
        %resolution,
        start = %interval.start(),
        end = %interval.end(),
        slots = counts.len(),
        "resolved aggregate counts"
    );

    Ok(AggregateCounter::new(name, interval, resolution, counts))
}

/// Loads every `bucket` from the one containing the interval start through the one
/// containing its end, concatenates them and cuts out the requested units.
async fn stitch<S>(
    source: &S,
    name: &str,
    bucket: Bucket,
    interval: Interval,
    resolution: Resolution,
) -> Result<Vec<i64>, CounterError>
where
    S: BucketSource + ?Sized,
{
    let mut starts = Vec::new();
    let mut cursor = bucket.floor(interval.start());
    while cursor <= interval.end() {
        starts.push(cursor);
        cursor = bucket.next(cursor)?;
    }

    let buckets = try_join_all(
        starts
            .into_iter()
            .map(|start| source.bucket_counts(name, bucket, start)),
    )
    .await?;

    let offset = bucket.slot(interval.start());
    let len = usize::try_from(resolution.units_spanned(interval.start(), interval.end()))
        .map_err(|_| CounterError::OutOfRange(interval.end()))?;

    Ok(concat_slice(buckets, offset, len))
}
