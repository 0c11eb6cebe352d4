use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_redis::{Client, CustomRedisError};
use metrics::counter;
use tracing::{debug, warn};

use crate::aggregate::{AggregateCounter, Interval};
use crate::dense::sparse_to_dense;
use crate::error::{ensure_name, CounterError};
use crate::keys::KeySpace;
use crate::repository::{AggregateCounterRepository, INCREMENTS, QUERIES, RESETS};
use crate::resolution::Resolution;
use crate::resolver::{resolve, Bucket, BucketSource};

/// Counters kept in redis hashes, one hash per bucket.
///
/// Writes are not transactional: an increment that fails half way leaves the buckets it
/// already reached updated and reports the error.
#[derive(Clone)]
pub struct RedisAggregateCounterRepository {
    redis: Arc<dyn Client + Send + Sync>,
    keys: KeySpace,
}

impl RedisAggregateCounterRepository {
    pub fn new(redis: Arc<dyn Client + Send + Sync>, keys: KeySpace) -> Self {
        Self { redis, keys }
    }

    /// Increment one bucket field, remembering the bucket for `reset` the first time the
    /// field moves away from an implicit zero.
    async fn increment_bucket(
        &self,
        bucket_key: String,
        field: String,
        amount: i64,
        bookkeeping_key: &str,
    ) -> Result<(), CounterError> {
        let value = self
            .redis
            .hincrby(bucket_key.clone(), field, amount)
            .await?;

        // The field just left an implicit zero, this may be the bucket's first write
        if value == amount {
            self.redis
                .sadd(bookkeeping_key.to_owned(), bucket_key)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BucketSource for RedisAggregateCounterRepository {
    async fn bucket_counts(
        &self,
        name: &str,
        bucket: Bucket,
        start: DateTime<Utc>,
    ) -> Result<Vec<i64>, CounterError> {
        let sparse = self
            .redis
            .hgetall(bucket.key(&self.keys, name, start))
            .await?;

        Ok(sparse_to_dense(
            &sparse,
            bucket.slots(start),
            bucket.unit_offset(),
        ))
    }

    async fn year_counts(&self, name: &str) -> Result<HashMap<i32, i64>, CounterError> {
        let sparse = self.redis.hgetall(self.keys.years_key(name)).await?;

        let mut years = HashMap::with_capacity(sparse.len());
        for (field, count) in sparse {
            match field.parse::<i32>() {
                Ok(year) => {
                    years.insert(year, count);
                }
                Err(_) => warn!(counter = %name, field = %field, "dropping unparseable year field"),
            }
        }
        Ok(years)
    }
}

#[async_trait]
impl AggregateCounterRepository for RedisAggregateCounterRepository {
    async fn increment(
        &self,
        name: &str,
        amount: i64,
        at: DateTime<Utc>,
    ) -> Result<i64, CounterError> {
        ensure_name(name)?;

        let bookkeeping_key = self.keys.bookkeeping_key(name);
        for (bucket_key, field) in self.keys.generator(name, at).levels() {
            self.increment_bucket(bucket_key, field, amount, &bookkeeping_key)
                .await?;
        }

        self.redis
            .sadd(self.keys.names_key(), name.to_owned())
            .await?;
        let total = self
            .redis
            .incr_by(self.keys.total_key(name), amount)
            .await?;

        counter!(INCREMENTS, "backend" => "redis").increment(1);
        debug!(counter = %name, amount, %at, total, "incremented aggregate counter");

        Ok(total)
    }

    async fn reset(&self, name: &str) -> Result<(), CounterError> {
        ensure_name(name)?;

        let bookkeeping_key = self.keys.bookkeeping_key(name);
        self.redis.del(self.keys.total_key(name)).await?;

        // Only the listed buckets leave the bookkeeping set, one recorded by a concurrent
        // increment stays behind for the next reset
        let buckets = self.redis.smembers(bookkeeping_key.clone()).await?;
        let removed = buckets.len();
        self.redis.batch_del(buckets.clone()).await?;
        self.redis.srem(bookkeeping_key, buckets).await?;
        self.redis
            .srem(self.keys.names_key(), vec![name.to_owned()])
            .await?;

        counter!(RESETS, "backend" => "redis").increment(1);
        debug!(counter = %name, buckets = removed, "reset aggregate counter");

        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, CounterError> {
        let mut names = self.redis.smembers(self.keys.names_key()).await?;
        names.sort();
        Ok(names)
    }

    async fn total(&self, name: &str) -> Result<i64, CounterError> {
        ensure_name(name)?;

        match self.redis.get(self.keys.total_key(name)).await {
            Ok(value) => Ok(value
                .parse::<i64>()
                .map_err(CustomRedisError::from)?),
            Err(CustomRedisError::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_counts(
        &self,
        name: &str,
        interval: Interval,
        resolution: Resolution,
    ) -> Result<AggregateCounter, CounterError> {
        ensure_name(name)?;

        counter!(QUERIES, "backend" => "redis", "resolution" => resolution.as_str()).increment(1);
        resolve(self, name, interval, resolution).await
    }
}
