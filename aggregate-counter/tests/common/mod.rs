#![allow(dead_code)]

use std::sync::Arc;

use aggregate_counter::{
    AggregateCounterRepository, InMemoryAggregateCounterRepository, KeySpace,
    RedisAggregateCounterRepository, RetryPolicy, RetryingClient,
};
use chrono::{DateTime, TimeZone, Utc};
use common_redis::MockRedisClient;

pub fn setup_tracing() {
    let _ignored = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("aggregate_counter=debug")
        .try_init();
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

pub fn redis_repository(mock: &MockRedisClient) -> RedisAggregateCounterRepository {
    RedisAggregateCounterRepository::new(
        Arc::new(RetryingClient::new(mock.clone(), RetryPolicy::disabled())),
        KeySpace::default(),
    )
}

/// One fresh repository per backend, labelled for assertion messages.
pub fn repositories() -> Vec<(&'static str, Arc<dyn AggregateCounterRepository>)> {
    setup_tracing();

    let memory: Arc<dyn AggregateCounterRepository> =
        Arc::new(InMemoryAggregateCounterRepository::new());
    let redis: Arc<dyn AggregateCounterRepository> =
        Arc::new(redis_repository(&MockRedisClient::new()));

    vec![("memory", memory), ("redis", redis)]
}
