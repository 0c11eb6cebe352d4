use std::str::FromStr;
use std::sync::Arc;
use std::time;

use common_redis::RedisClient;
use envconfig::Envconfig;
use tracing::info;

use crate::error::CounterError;
use crate::keys::KeySpace;
use crate::memory::InMemoryAggregateCounterRepository;
use crate::redis_repository::RedisAggregateCounterRepository;
use crate::repository::AggregateCounterRepository;
use crate::retry::{RetryPolicy, RetryingClient};

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "AGGREGATE_COUNTER_BACKEND", default = "redis")]
    pub backend: Backend,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(default = "aggregatecounters")]
    pub key_prefix: NonEmptyString,

    #[envconfig(from = "REDIS_RESPONSE_TIMEOUT_MS", default = "100")]
    pub redis_response_timeout: EnvMsDuration,

    #[envconfig(from = "REDIS_CONNECTION_TIMEOUT_MS", default = "5000")]
    pub redis_connection_timeout: EnvMsDuration,

    #[envconfig(nested = true)]
    pub retry_policy: RetryPolicyConfig,
}

#[derive(Envconfig, Clone)]
pub struct RetryPolicyConfig {
    #[envconfig(from = "RETRY_MAX_ATTEMPTS", default = "3")]
    pub max_attempts: u32,

    #[envconfig(from = "RETRY_BACKOFF_COEFFICIENT", default = "2")]
    pub backoff_coefficient: u32,

    #[envconfig(from = "RETRY_INITIAL_INTERVAL_MS", default = "1000")]
    pub initial_interval: EnvMsDuration,

    #[envconfig(from = "RETRY_MAXIMUM_INTERVAL_MS", default = "1000")]
    pub maximum_interval: EnvMsDuration,
}

impl RetryPolicyConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.backoff_coefficient,
            self.initial_interval.0,
            Some(self.maximum_interval.0),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Redis,
    Memory,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseBackendError(pub String);

impl std::fmt::Display for ParseBackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} is not a valid backend, expected redis or memory", self.0)
    }
}

impl std::error::Error for ParseBackendError {}

impl FromStr for Backend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Backend::Redis),
            "memory" | "in-memory" => Ok(Backend::Memory),
            _ => Err(ParseBackendError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnvMsDuration(pub time::Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl std::fmt::Display for ParseEnvMsDurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("expected a duration in milliseconds")
    }
}

impl std::error::Error for ParseEnvMsDurationError {}

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = s.parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;

        Ok(EnvMsDuration(time::Duration::from_millis(ms)))
    }
}

#[derive(Debug, Clone)]
pub struct NonEmptyString(pub String);

impl NonEmptyString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StringIsEmptyError;

impl std::fmt::Display for StringIsEmptyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("value must not be empty")
    }
}

impl std::error::Error for StringIsEmptyError {}

impl FromStr for NonEmptyString {
    type Err = StringIsEmptyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            Err(StringIsEmptyError)
        } else {
            Ok(NonEmptyString(s.to_owned()))
        }
    }
}

/// A zero duration in the environment means "no timeout".
fn optional_timeout(duration: EnvMsDuration) -> Option<time::Duration> {
    Some(duration.0).filter(|d| !d.is_zero())
}

/// Build the repository selected by `config.backend`.
pub async fn build_repository(
    config: &Config,
) -> Result<Arc<dyn AggregateCounterRepository>, CounterError> {
    match config.backend {
        Backend::Memory => {
            info!("using in-memory aggregate counters");
            Ok(Arc::new(InMemoryAggregateCounterRepository::new()))
        }
        Backend::Redis => {
            let client = RedisClient::with_config(
                config.redis_url.clone(),
                optional_timeout(config.redis_response_timeout),
                optional_timeout(config.redis_connection_timeout),
            )
            .await?;
            let policy = config.retry_policy.policy();

            info!(
                prefix = config.key_prefix.as_str(),
                max_attempts = policy.max_attempts(),
                "using redis aggregate counters"
            );

            Ok(Arc::new(RedisAggregateCounterRepository::new(
                Arc::new(RetryingClient::new(client, policy)),
                KeySpace::new(config.key_prefix.as_str()),
            )))
        }
    }
}
