//! Time-bucketed event counters with minute, hour, day, month and year rollups.
//!
//! Each increment lands in five nested buckets (all years, one year, one month, one day,
//! one hour). Range queries at a given resolution read the buckets one level coarser and
//! stitch them into a dense series covering exactly the requested interval.
pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod dense;
pub mod error;
pub mod keys;
pub mod memory;
pub mod redis_repository;
pub mod repository;
pub mod resolution;
pub mod resolver;
pub mod retry;

pub use aggregate::{AggregateCounter, Interval};
pub use config::{build_repository, Backend, Config};
pub use error::CounterError;
pub use keys::KeySpace;
pub use memory::InMemoryAggregateCounterRepository;
pub use redis_repository::RedisAggregateCounterRepository;
pub use repository::AggregateCounterRepository;
pub use resolution::Resolution;
pub use retry::{RetryPolicy, RetryingClient};
