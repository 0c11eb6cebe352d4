use chrono::{DateTime, Utc};
use common_redis::CustomRedisError;
use thiserror::Error;

/// Enumeration of errors returned by counter repositories.
#[derive(Error, Debug, Clone)]
pub enum CounterError {
    #[error("counter name must not be empty")]
    EmptyName,
    #[error("at least one count must be requested, got {0}")]
    InvalidCount(u32),
    #[error("interval start {start} is after its end {end}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("calendar arithmetic from {0} left the representable range")]
    OutOfRange(DateTime<Utc>),
    #[error("incrementing {0} would overflow a 64-bit count")]
    Overflow(String),
    #[error("backend error: {0}")]
    Backend(#[from] CustomRedisError),
}

pub(crate) fn ensure_name(name: &str) -> Result<(), CounterError> {
    if name.is_empty() {
        Err(CounterError::EmptyName)
    } else {
        Ok(())
    }
}
