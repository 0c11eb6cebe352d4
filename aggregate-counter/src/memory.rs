use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use metrics::counter;
use tracing::debug;

use crate::aggregate::{AggregateCounter, Interval};
use crate::error::{ensure_name, CounterError};
use crate::repository::{AggregateCounterRepository, INCREMENTS, QUERIES, RESETS};
use crate::resolution::Resolution;
use crate::resolver::{resolve, Bucket, BucketSource};

#[derive(Debug, Default)]
struct CounterState {
    total: i64,
    years: HashMap<i32, i64>,
    buckets: HashMap<(Bucket, DateTime<Utc>), Vec<i64>>,
}

impl CounterState {
    /// Applies `amount` to the total and every bucket covering `at`, or to nothing at all
    /// if any of them would overflow.
    fn increment(
        &mut self,
        name: &str,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, CounterError> {
        let overflow = || CounterError::Overflow(name.to_owned());

        let year = at.year();
        let year_count = self
            .years
            .get(&year)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(overflow)?;

        let mut slot_counts = Vec::with_capacity(Bucket::ALL.len());
        for bucket in Bucket::ALL {
            let start = bucket.floor(at);
            let slot = bucket.slot(at);
            let current = self
                .buckets
                .get(&(bucket, start))
                .and_then(|slots| slots.get(slot).copied())
                .unwrap_or(0);
            let count = current.checked_add(amount).ok_or_else(overflow)?;
            slot_counts.push((bucket, start, slot, count));
        }

        let total = self.total.checked_add(amount).ok_or_else(overflow)?;

        self.years.insert(year, year_count);
        for (bucket, start, slot, count) in slot_counts {
            let slots = self
                .buckets
                .entry((bucket, start))
                .or_insert_with(|| vec![0; bucket.slots(start)]);
            if let Some(value) = slots.get_mut(slot) {
                *value = count;
            }
        }
        self.total = total;

        Ok(total)
    }
}

/// Counters held in process memory, for tests and single-process deployments.
///
/// Each counter's state sits behind its map entry's lock, so concurrent increments of
/// the same counter never lose updates.
#[derive(Default)]
pub struct InMemoryAggregateCounterRepository {
    counters: DashMap<String, CounterState>,
}

impl InMemoryAggregateCounterRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BucketSource for InMemoryAggregateCounterRepository {
    async fn bucket_counts(
        &self,
        name: &str,
        bucket: Bucket,
        start: DateTime<Utc>,
    ) -> Result<Vec<i64>, CounterError> {
        let stored = self
            .counters
            .get(name)
            .and_then(|state| state.buckets.get(&(bucket, start)).cloned());

        Ok(stored.unwrap_or_else(|| vec![0; bucket.slots(start)]))
    }

    async fn year_counts(&self, name: &str) -> Result<HashMap<i32, i64>, CounterError> {
        Ok(self
            .counters
            .get(name)
            .map(|state| state.years.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AggregateCounterRepository for InMemoryAggregateCounterRepository {
    async fn increment(
        &self,
        name: &str,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, CounterError> {
        ensure_name(name)?;

        let total = self
            .counters
            .entry(name.to_owned())
            .or_default()
            .increment(name, amount, at)?;

        counter!(INCREMENTS, "backend" => "memory").increment(1);
        debug!(counter = %name, amount, %at, total, "incremented aggregate counter");

        Ok(total)
    }

    async fn reset(&self, name: &str) -> Result<(), CounterError> {
        ensure_name(name)?;

        self.counters.remove(name);

        counter!(RESETS, "backend" => "memory").increment(1);
        debug!(counter = %name, "reset aggregate counter");

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CounterError> {
        let mut names: Vec<String> = self
            .counters
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn total(&self, name: &str) -> Result<i64, CounterError> {
        ensure_name(name)?;

        Ok(self.counters.get(name).map(|state| state.total).unwrap_or(0))
    }

    async fn get_counts(
        &self,
        name: &str,
        interval: Interval,
        resolution: Resolution,
    ) -> Result<AggregateCounter, CounterError> {
        ensure_name(name)?;

        counter!(QUERIES, "backend" => "memory", "resolution" => resolution.as_str()).increment(1);
        resolve(self, name, interval, resolution).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let repo = Arc::new(InMemoryAggregateCounterRepository::new());
        let at = Utc.with_ymd_and_hms(2024, 5, 5, 5, 5, 5).unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        repo.increment("hits", 1, at).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.total("hits").await.unwrap(), 1600);
        let minute = repo
            .get_counts_ending("hits", 1, at, Resolution::Minute)
            .await
            .unwrap();
        assert_eq!(minute.counts(), &[1600]);
    }

    #[tokio::test]
    async fn test_overflow_leaves_state_untouched() {
        let repo = InMemoryAggregateCounterRepository::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        repo.increment("big", i64::MAX, at).await.unwrap();

        assert!(matches!(
            repo.increment("big", 1, at).await,
            Err(CounterError::Overflow(name)) if name == "big"
        ));
        // a later instant shares the year and total, so it overflows too
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(repo.increment("big", 1, later).await.is_err());

        let state = repo.counters.get("big").unwrap();
        assert_eq!(state.total, i64::MAX);
        assert_eq!(state.years.get(&2024), Some(&i64::MAX));
        assert!(!state
            .buckets
            .contains_key(&(Bucket::Hour, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())));
    }

    #[tokio::test]
    async fn test_state_is_sized_per_bucket() {
        let repo = InMemoryAggregateCounterRepository::new();
        let at = Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap();
        repo.increment("feb", 2, at).await.unwrap();

        let state = repo.counters.get("feb").unwrap();
        let month = state
            .buckets
            .get(&(Bucket::Month, Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap()))
            .unwrap();
        assert_eq!(month.len(), 28);
        assert_eq!(month[27], 2);
        assert_eq!(state.years.get(&2023), Some(&2));
    }
}
