use std::iter;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CounterError;
use crate::resolution::Resolution;

/// A closed time range, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CounterError> {
        if start > end {
            return Err(CounterError::InvalidInterval { start, end });
        }
        Ok(Interval { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// The answer to a range query: one count per resolution unit of the interval,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateCounter {
    name: String,
    interval: Interval,
    resolution: Resolution,
    counts: Vec<i64>,
}

impl AggregateCounter {
    pub fn new(
        name: impl Into<String>,
        interval: Interval,
        resolution: Resolution,
        counts: Vec<i64>,
    ) -> Self {
        AggregateCounter {
            name: name.into(),
            interval,
            resolution,
            counts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn counts(&self) -> &[i64] {
        &self.counts
    }

    pub fn total(&self) -> i64 {
        self.counts.iter().sum()
    }

    /// The start of the unit each slot of `counts()` covers.
    pub fn instants(&self) -> Vec<DateTime<Utc>> {
        let first = self.resolution.floor(self.interval.start);
        iter::successors(Some(first), |at| self.resolution.next(*at).ok())
            .take(self.counts.len())
            .collect()
    }
}
