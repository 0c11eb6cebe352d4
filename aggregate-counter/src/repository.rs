use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::aggregate::{AggregateCounter, Interval};
use crate::error::CounterError;
use crate::resolution::Resolution;

pub const INCREMENTS: &str = "aggregate_counter_increments_total";
pub const RESETS: &str = "aggregate_counter_resets_total";
pub const QUERIES: &str = "aggregate_counter_queries_total";

/// Time-bucketed event counters.
///
/// Writers call `increment` for every event; readers ask for a dense series of counts
/// over an interval at a chosen resolution. A counter springs into existence on its
/// first increment and is removed completely by `reset`.
#[async_trait]
pub trait AggregateCounterRepository: Send + Sync {
    /// Add `amount` (which may be negative) to every bucket covering `at` and to the
    /// all-time total, returning the new all-time total.
    async fn increment(
        &self,
        name: &str,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, CounterError>;

    async fn increment_now(&self, name: &str, amount: i64) -> Result<i64, CounterError> {
        self.increment(name, amount, Utc::now()).await
    }

    /// Remove every trace of `name`. Resetting an unknown counter is not an error.
    async fn reset(&self, name: &str) -> Result<(), CounterError>;

    /// Names of all counters incremented since their last reset, sorted.
    async fn list(&self) -> Result<Vec<String>, CounterError>;

    /// The all-time total of `name`, zero if it was never incremented.
    async fn total(&self, name: &str) -> Result<i64, CounterError>;

    /// Counts for `interval`, both ends inclusive, one slot per `resolution` unit.
    async fn get_counts(
        &self,
        name: &str,
        interval: Interval,
        resolution: Resolution,
    ) -> Result<AggregateCounter, CounterError>;

    /// The last `n_counts` units of `resolution` ending with the one containing `end`.
    async fn get_counts_ending(
        &self,
        name: &str,
        n_counts: u32,
        end: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<AggregateCounter, CounterError> {
        if n_counts == 0 {
            return Err(CounterError::InvalidCount(n_counts));
        }
        let start = resolution.minus(end, n_counts - 1)?;
        self.get_counts(name, Interval::new(start, end)?, resolution)
            .await
    }

    /// The last `n_counts` units of `resolution` up to now.
    async fn get_last_counts(
        &self,
        name: &str,
        n_counts: u32,
        resolution: Resolution,
    ) -> Result<AggregateCounter, CounterError> {
        self.get_counts_ending(name, n_counts, Utc::now(), resolution)
            .await
    }
}
