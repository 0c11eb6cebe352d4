use std::collections::HashMap;
use std::future::Future;
use std::time;

use async_trait::async_trait;
use common_redis::{Client, CustomRedisError};
use metrics::counter;
use tokio_retry::RetryIf;
use tracing::warn;

pub const BACKEND_RETRIES: &str = "aggregate_counter_backend_retries_total";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// How many times, and how far apart, a transiently failing backend call is attempted.
pub struct RetryPolicy {
    /// Total attempts including the first one.
    max_attempts: u32,
    /// Coefficient to multiply initial_interval with for every past attempt.
    backoff_coefficient: u32,
    /// The backoff interval for the first retry.
    initial_interval: time::Duration,
    /// The maximum possible backoff between retries.
    maximum_interval: Option<time::Duration>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        backoff_coefficient: u32,
        initial_interval: time::Duration,
        maximum_interval: Option<time::Duration>,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_coefficient,
            initial_interval,
            maximum_interval,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self::new(1, 1, time::Duration::ZERO, None)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calculate the time to wait after the given (zero-based) failed attempt.
    pub fn time_until_next_retry(&self, attempt: u32) -> time::Duration {
        let candidate_interval = self
            .initial_interval
            .checked_mul(self.backoff_coefficient.saturating_pow(attempt))
            .unwrap_or(time::Duration::MAX);

        match self.maximum_interval {
            Some(max_interval) => std::cmp::min(candidate_interval, max_interval),
            None => candidate_interval,
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart: the coefficient of 2 is capped straight away
    /// by the one second maximum.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_coefficient: 2,
            initial_interval: time::Duration::from_secs(1),
            maximum_interval: Some(time::Duration::from_secs(1)),
        }
    }
}

/// A `Client` that retries transient failures of the wrapped client according to a
/// `RetryPolicy`. Non-transient failures are returned on the first occurrence.
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C> RetryingClient<C>
where
    C: Client + Send + Sync,
{
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Run `action`, retrying transient failures while the policy has attempts left.
    async fn retry<T, A, Fut>(&self, op: &'static str, action: A) -> Result<T, CustomRedisError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CustomRedisError>>,
    {
        let policy = self.policy;
        let strategy = (0..policy.max_attempts - 1)
            .map(move |attempt| policy.time_until_next_retry(attempt));

        let mut failures = 0;
        RetryIf::spawn(strategy, action, |error: &CustomRedisError| {
            failures += 1;
            if !error.is_transient() || failures >= policy.max_attempts {
                return false;
            }

            warn!(
                op,
                attempt = failures,
                max_attempts = policy.max_attempts,
                wait = ?policy.time_until_next_retry(failures - 1),
                error = %error,
                "transient backend failure, retrying"
            );
            counter!(BACKEND_RETRIES, "op" => op).increment(1);
            true
        })
        .await
    }
}

#[async_trait]
impl<C> Client for RetryingClient<C>
where
    C: Client + Send + Sync,
{
    async fn hincrby(
        &self,
        k: String,
        field: String,
        amount: i64,
    ) -> Result<i64, CustomRedisError> {
        let inner = &self.inner;
        self.retry("hincrby", move || {
            inner.hincrby(k.clone(), field.clone(), amount)
        })
        .await
    }

    async fn hgetall(&self, k: String) -> Result<HashMap<String, i64>, CustomRedisError> {
        let inner = &self.inner;
        self.retry("hgetall", move || inner.hgetall(k.clone())).await
    }

    async fn incr_by(&self, k: String, amount: i64) -> Result<i64, CustomRedisError> {
        let inner = &self.inner;
        self.retry("incr_by", move || inner.incr_by(k.clone(), amount))
            .await
    }

    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let inner = &self.inner;
        self.retry("get", move || inner.get(k.clone())).await
    }

    async fn sadd(&self, k: String, member: String) -> Result<(), CustomRedisError> {
        let inner = &self.inner;
        self.retry("sadd", move || inner.sadd(k.clone(), member.clone()))
            .await
    }

    async fn srem(&self, k: String, members: Vec<String>) -> Result<(), CustomRedisError> {
        let inner = &self.inner;
        self.retry("srem", move || inner.srem(k.clone(), members.clone()))
            .await
    }

    async fn smembers(&self, k: String) -> Result<Vec<String>, CustomRedisError> {
        let inner = &self.inner;
        self.retry("smembers", move || inner.smembers(k.clone()))
            .await
    }

    async fn del(&self, k: String) -> Result<(), CustomRedisError> {
        let inner = &self.inner;
        self.retry("del", move || inner.del(k.clone())).await
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError> {
        let inner = &self.inner;
        self.retry("batch_del", move || inner.batch_del(keys.clone()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_redis::{MockRedisClient, RedisErrorKind};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, 2, time::Duration::from_millis(1), None)
    }

    #[test]
    fn test_default_policy_is_capped_at_initial_interval() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.time_until_next_retry(0), time::Duration::from_secs(1));
        assert_eq!(policy.time_until_next_retry(1), time::Duration::from_secs(1));
        assert_eq!(policy.time_until_next_retry(5), time::Duration::from_secs(1));
    }

    #[test]
    fn test_uncapped_policy_grows_exponentially() {
        let policy = RetryPolicy::new(5, 2, time::Duration::from_millis(100), None);

        assert_eq!(policy.time_until_next_retry(0), time::Duration::from_millis(100));
        assert_eq!(policy.time_until_next_retry(1), time::Duration::from_millis(200));
        assert_eq!(policy.time_until_next_retry(3), time::Duration::from_millis(800));
        // the coefficient saturates instead of overflowing
        assert!(policy.time_until_next_retry(200) > time::Duration::from_secs(86_400));
    }

    #[test]
    fn test_zero_attempts_still_attempts_once() {
        assert_eq!(RetryPolicy::new(0, 2, time::Duration::ZERO, None).max_attempts(), 1);
        assert_eq!(RetryPolicy::disabled().max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mock = MockRedisClient::new()
            .fail_next("hincrby", CustomRedisError::Timeout)
            .fail_next(
                "hincrby",
                CustomRedisError::from_redis_kind(RedisErrorKind::IoError, "connection reset"),
            );
        let client = RetryingClient::new(mock.clone(), fast_policy(3));

        let value = client
            .hincrby("k".to_string(), "1".to_string(), 4)
            .await
            .unwrap();

        assert_eq!(value, 4);
        assert_eq!(mock.calls_for("hincrby"), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_the_last_error() {
        let mock = MockRedisClient::new()
            .fail_next("sadd", CustomRedisError::Timeout)
            .fail_next("sadd", CustomRedisError::Timeout)
            .fail_next("sadd", CustomRedisError::Timeout);
        let client = RetryingClient::new(mock.clone(), fast_policy(3));

        let result = client.sadd("s".to_string(), "m".to_string()).await;

        assert!(matches!(result, Err(CustomRedisError::Timeout)));
        assert_eq!(mock.calls_for("sadd"), 3);
        assert!(mock.keys().is_empty());
    }

    #[tokio::test]
    async fn test_non_transient_failures_are_not_retried() {
        let mock = MockRedisClient::new().fail_next(
            "hgetall",
            CustomRedisError::from_redis_kind(RedisErrorKind::TypeError, "WRONGTYPE"),
        );
        let client = RetryingClient::new(mock.clone(), fast_policy(3));

        let result = client.hgetall("k".to_string()).await;

        assert!(matches!(result, Err(CustomRedisError::Redis(_))));
        assert_eq!(mock.calls_for("hgetall"), 1);
    }

    #[tokio::test]
    async fn test_not_found_passes_straight_through() {
        let mock = MockRedisClient::new();
        let client = RetryingClient::new(mock.clone(), fast_policy(3));

        assert!(matches!(
            client.get("missing".to_string()).await,
            Err(CustomRedisError::NotFound)
        ));
        assert_eq!(mock.calls_for("get"), 1);
    }
}
