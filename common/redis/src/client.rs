use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::{Client, CustomRedisError};

/// A redis client over a `ConnectionManager`, which re-establishes the underlying
/// multiplexed connection after it drops. The call that observed the drop still fails,
/// later calls go out on the new connection.
pub struct RedisClient {
    connection: ConnectionManager,
}

impl RedisClient {
    /// Create a new RedisClient with explicit timeouts
    ///
    /// # Arguments
    /// * `addr` - Redis connection string
    /// * `response_timeout` - Optional timeout for Redis command responses. `None` means no timeout (blocks indefinitely).
    /// * `connection_timeout` - Optional timeout for establishing connections. `None` means no timeout (blocks indefinitely).
    ///
    /// # Errors
    /// Returns `CustomRedisError::InvalidConfiguration` if `Some(Duration::ZERO)` is passed - use `None` for no timeout instead.
    pub async fn with_config(
        addr: String,
        response_timeout: Option<Duration>,
        connection_timeout: Option<Duration>,
    ) -> Result<RedisClient, CustomRedisError> {
        let client = redis::Client::open(addr)?;

        if response_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(CustomRedisError::InvalidConfiguration(
                "Redis response timeout cannot be Duration::ZERO - use None for no timeout"
                    .to_string(),
            ));
        }
        if connection_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(CustomRedisError::InvalidConfiguration(
                "Redis connection timeout cannot be Duration::ZERO - use None for no timeout"
                    .to_string(),
            ));
        }

        let mut config = ConnectionManagerConfig::new();

        if let Some(timeout) = response_timeout {
            config = config.set_response_timeout(timeout);
        }

        if let Some(timeout) = connection_timeout {
            config = config.set_connection_timeout(timeout);
        }

        let connection = ConnectionManager::new_with_config(client, config).await?;

        debug!(
            ?response_timeout,
            ?connection_timeout,
            "established managed redis connection"
        );

        Ok(RedisClient { connection })
    }
}

#[async_trait]
impl Client for RedisClient {
    async fn hincrby(
        &self,
        k: String,
        field: String,
        amount: i64,
    ) -> Result<i64, CustomRedisError> {
        let mut conn = self.connection.clone();
        let value = conn.hincr::<_, _, _, i64>(k, field, amount).await?;
        Ok(value)
    }

    async fn hgetall(&self, k: String) -> Result<HashMap<String, i64>, CustomRedisError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, i64> = conn.hgetall(k).await?;
        Ok(fields)
    }

    async fn incr_by(&self, k: String, amount: i64) -> Result<i64, CustomRedisError> {
        let mut conn = self.connection.clone();
        let value = conn.incr::<_, _, i64>(k, amount).await?;
        Ok(value)
    }

    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(k).await?;

        value.ok_or(CustomRedisError::NotFound)
    }

    async fn sadd(&self, k: String, member: String) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        conn.sadd::<_, _, ()>(k, member).await?;
        Ok(())
    }

    async fn srem(&self, k: String, members: Vec<String>) -> Result<(), CustomRedisError> {
        // SREM with no members is a redis syntax error
        if members.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        conn.srem::<_, _, ()>(k, members).await?;
        Ok(())
    }

    async fn smembers(&self, k: String) -> Result<Vec<String>, CustomRedisError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn.smembers(k).await?;
        Ok(members)
    }

    async fn del(&self, k: String) -> Result<(), CustomRedisError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(k).await?;
        Ok(())
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError> {
        // DEL with no arguments is a redis syntax error
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }
}
