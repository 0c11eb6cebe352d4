use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// Re-export ErrorKind and RetryMethod so consumers can construct CustomRedisError in tests
// and understand retry behavior
pub use redis::ErrorKind as RedisErrorKind;
pub use redis::RetryMethod;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl From<std::num::ParseIntError> for CustomRedisError {
    fn from(err: std::num::ParseIntError) -> Self {
        CustomRedisError::ParseError(err.to_string())
    }
}

impl CustomRedisError {
    /// Create a Redis error from an ErrorKind (primarily for testing)
    pub fn from_redis_kind(kind: redis::ErrorKind, description: &'static str) -> Self {
        CustomRedisError::Redis(Arc::new(redis::RedisError::from((kind, description))))
    }

    /// Check if a Redis error is a configuration error that should never be retried
    fn is_config_error(err: &redis::RedisError) -> bool {
        matches!(
            err.kind(),
            redis::ErrorKind::InvalidClientConfig | redis::ErrorKind::AuthenticationFailed
        )
    }

    /// Determine the appropriate retry strategy for this error
    ///
    /// Delegates to redis crate's `retry_method()` for Redis errors.
    pub fn retry_method(&self) -> RetryMethod {
        match self {
            // Timeouts: wait before retrying to avoid hammering the service
            CustomRedisError::Timeout => RetryMethod::WaitAndRetry,
            CustomRedisError::InvalidConfiguration(_) => RetryMethod::NoRetry,
            CustomRedisError::ParseError(_) => RetryMethod::NoRetry,
            // NotFound is permanent - caller should handle this
            CustomRedisError::NotFound => RetryMethod::NoRetry,
            CustomRedisError::Redis(err) => {
                if Self::is_config_error(err) {
                    RetryMethod::NoRetry
                } else {
                    err.retry_method()
                }
            }
        }
    }

    /// Connection-class failures (timeouts, resets, refused connections) that may resolve
    /// if the same command is sent again.
    pub fn is_transient(&self) -> bool {
        !matches!(self.retry_method(), RetryMethod::NoRetry)
    }
}

/// The subset of redis commands the counter stores rely on.
///
/// Hash and set members are plain UTF-8 strings, counts are 64-bit integers.
#[async_trait]
pub trait Client {
    /// HINCRBY, returning the field's value after the increment.
    async fn hincrby(&self, k: String, field: String, amount: i64)
        -> Result<i64, CustomRedisError>;

    /// HGETALL. A missing key is an empty map, not an error.
    async fn hgetall(&self, k: String) -> Result<HashMap<String, i64>, CustomRedisError>;

    /// INCRBY, returning the value after the increment.
    async fn incr_by(&self, k: String, amount: i64) -> Result<i64, CustomRedisError>;

    /// GET. Returns `CustomRedisError::NotFound` when the key does not exist.
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;

    async fn sadd(&self, k: String, member: String) -> Result<(), CustomRedisError>;
    /// SREM of every given member at once; an empty list is a no-op.
    async fn srem(&self, k: String, members: Vec<String>) -> Result<(), CustomRedisError>;
    async fn smembers(&self, k: String) -> Result<Vec<String>, CustomRedisError>;

    async fn del(&self, k: String) -> Result<(), CustomRedisError>;
    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError>;
}

// Module declarations
mod client;
mod mock;

// Re-export public APIs
pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};

#[cfg(test)]
mod tests {
    use super::*;

    mod retry_methods {
        use super::*;

        #[test]
        fn test_timeout_wait_and_retry() {
            let err = CustomRedisError::Timeout;
            assert!(matches!(err.retry_method(), RetryMethod::WaitAndRetry));
            assert!(err.is_transient());
        }

        #[test]
        fn test_parse_error_no_retry() {
            let err = CustomRedisError::ParseError("invalid data".to_string());
            assert!(matches!(err.retry_method(), RetryMethod::NoRetry));
            assert!(!err.is_transient());
        }

        #[test]
        fn test_not_found_no_retry() {
            let err = CustomRedisError::NotFound;
            assert!(!err.is_transient());
        }

        #[test]
        fn test_invalid_configuration_no_retry() {
            let err = CustomRedisError::InvalidConfiguration("test config error".to_string());
            assert!(!err.is_transient());
        }

        #[test]
        fn test_authentication_failed_is_not_transient() {
            let err = CustomRedisError::from_redis_kind(
                RedisErrorKind::AuthenticationFailed,
                "WRONGPASS invalid username-password pair",
            );

            assert!(
                !err.is_transient(),
                "AuthenticationFailed should not be retried"
            );
        }

        #[test]
        fn test_io_error_is_transient() {
            let err = CustomRedisError::from_redis_kind(RedisErrorKind::IoError, "Connection refused");

            assert!(err.is_transient(), "IoError should be retried");
        }

        #[test]
        fn test_parse_int_error_converts_to_parse_error() {
            let err: CustomRedisError = "abc".parse::<i64>().unwrap_err().into();
            assert!(matches!(err, CustomRedisError::ParseError(_)));
        }
    }
}
