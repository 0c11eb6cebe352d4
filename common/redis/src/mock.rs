use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Client, CustomRedisError};

/// An in-process stand-in for redis.
///
/// Unlike a canned-response mock this one keeps real hash, set and string state so
/// stores built on top of it behave as they would against a server. Every call is
/// recorded, and failures can be queued per operation with `fail_next`.
/// Clones share state.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    data: Arc<Mutex<MockRedisData>>,
    failures: Arc<Mutex<HashMap<String, VecDeque<CustomRedisError>>>>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

#[derive(Default)]
struct MockRedisData {
    strings: HashMap<String, i64>,
    hashes: HashMap<String, HashMap<String, i64>>,
    sets: HashMap<String, HashSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRedisValue {
    None,
    String(String),
    I64(i64),
    FieldAmount(String, i64),
    VecString(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

// Poisoning only happens if a test panicked mid-call, the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// Redis refuses increments that leave the signed 64-bit range
fn checked_increment(value: i64, amount: i64) -> Result<i64, CustomRedisError> {
    value.checked_add(amount).ok_or_else(|| {
        CustomRedisError::from_redis_kind(
            redis::ErrorKind::ResponseError,
            "increment or decrement would overflow",
        )
    })
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next call to `op`, before touching any state.
    /// Errors queued for the same op are returned in order.
    pub fn fail_next(&self, op: &str, err: CustomRedisError) -> Self {
        lock(&self.failures)
            .entry(op.to_owned())
            .or_default()
            .push_back(err);
        self.clone()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.op == op).count()
    }

    /// Every key currently holding a value, sorted.
    pub fn keys(&self) -> Vec<String> {
        let data = lock(&self.data);
        let mut keys: Vec<String> = data
            .strings
            .keys()
            .chain(data.hashes.keys())
            .chain(data.sets.keys())
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    fn record(&self, op: &str, key: &str, value: MockRedisValue) -> Result<(), CustomRedisError> {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_string(),
            key: key.to_string(),
            value,
        });

        match lock(&self.failures).get_mut(op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn hincrby(
        &self,
        key: String,
        field: String,
        amount: i64,
    ) -> Result<i64, CustomRedisError> {
        self.record(
            "hincrby",
            &key,
            MockRedisValue::FieldAmount(field.clone(), amount),
        )?;

        let mut data = lock(&self.data);
        let value = data.hashes.entry(key).or_default().entry(field).or_insert(0);
        *value = checked_increment(*value, amount)?;
        Ok(*value)
    }

    async fn hgetall(&self, key: String) -> Result<HashMap<String, i64>, CustomRedisError> {
        self.record("hgetall", &key, MockRedisValue::None)?;

        Ok(lock(&self.data)
            .hashes
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn incr_by(&self, key: String, amount: i64) -> Result<i64, CustomRedisError> {
        self.record("incr_by", &key, MockRedisValue::I64(amount))?;

        let mut data = lock(&self.data);
        let value = data.strings.entry(key).or_insert(0);
        *value = checked_increment(*value, amount)?;
        Ok(*value)
    }

    async fn get(&self, key: String) -> Result<String, CustomRedisError> {
        self.record("get", &key, MockRedisValue::None)?;

        match lock(&self.data).strings.get(&key) {
            Some(value) => Ok(value.to_string()),
            None => Err(CustomRedisError::NotFound),
        }
    }

    async fn sadd(&self, key: String, member: String) -> Result<(), CustomRedisError> {
        self.record("sadd", &key, MockRedisValue::String(member.clone()))?;

        lock(&self.data).sets.entry(key).or_default().insert(member);
        Ok(())
    }

    async fn srem(&self, key: String, members: Vec<String>) -> Result<(), CustomRedisError> {
        self.record("srem", &key, MockRedisValue::VecString(members.clone()))?;

        let mut data = lock(&self.data);
        let emptied = match data.sets.get_mut(&key) {
            Some(set) => {
                for member in &members {
                    set.remove(member);
                }
                set.is_empty()
            }
            None => false,
        };
        // redis drops a set once its last member is gone
        if emptied {
            data.sets.remove(&key);
        }
        Ok(())
    }

    async fn smembers(&self, key: String) -> Result<Vec<String>, CustomRedisError> {
        self.record("smembers", &key, MockRedisValue::None)?;

        Ok(lock(&self.data)
            .sets
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn del(&self, key: String) -> Result<(), CustomRedisError> {
        self.record("del", &key, MockRedisValue::None)?;

        let mut data = lock(&self.data);
        data.strings.remove(&key);
        data.hashes.remove(&key);
        data.sets.remove(&key);
        Ok(())
    }

    async fn batch_del(&self, keys: Vec<String>) -> Result<(), CustomRedisError> {
        self.record(
            "batch_del",
            &format!("keys={}", keys.len()),
            MockRedisValue::VecString(keys.clone()),
        )?;

        let mut data = lock(&self.data);
        for key in keys {
            data.strings.remove(&key);
            data.hashes.remove(&key);
            data.sets.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hincrby_returns_running_value() {
        let client = MockRedisClient::new();

        assert_eq!(
            client
                .hincrby("h".to_string(), "1".to_string(), 5)
                .await
                .unwrap(),
            5
        );
        assert_eq!(
            client
                .hincrby("h".to_string(), "1".to_string(), -2)
                .await
                .unwrap(),
            3
        );

        let all = client.hgetall("h".to_string()).await.unwrap();
        assert_eq!(all.get("1"), Some(&3));
        assert!(client.hgetall("missing".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_increments_are_rejected() {
        let client = MockRedisClient::new();
        client
            .hincrby("h".to_string(), "1".to_string(), i64::MAX)
            .await
            .unwrap();
        client.incr_by("t".to_string(), i64::MIN).await.unwrap();

        let err = client
            .hincrby("h".to_string(), "1".to_string(), 1)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert!(client.incr_by("t".to_string(), -1).await.is_err());

        let all = client.hgetall("h".to_string()).await.unwrap();
        assert_eq!(all.get("1"), Some(&i64::MAX));
        assert_eq!(client.get("t".to_string()).await.unwrap(), i64::MIN.to_string());
    }

    #[tokio::test]
    async fn test_get_missing_key_is_not_found() {
        let client = MockRedisClient::new();

        assert!(matches!(
            client.get("nothing".to_string()).await,
            Err(CustomRedisError::NotFound)
        ));

        client.incr_by("total".to_string(), 7).await.unwrap();
        assert_eq!(client.get("total".to_string()).await.unwrap(), "7");
    }

    #[tokio::test]
    async fn test_sets_and_deletes() {
        let client = MockRedisClient::new();
        client
            .sadd("s".to_string(), "a".to_string())
            .await
            .unwrap();
        client
            .sadd("s".to_string(), "a".to_string())
            .await
            .unwrap();
        client
            .sadd("s".to_string(), "b".to_string())
            .await
            .unwrap();

        let mut members = client.smembers("s".to_string()).await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        client
            .srem("s".to_string(), vec!["a".to_string()])
            .await
            .unwrap();
        client
            .srem("s".to_string(), vec!["b".to_string()])
            .await
            .unwrap();
        assert!(client.keys().is_empty());

        client.incr_by("x".to_string(), 1).await.unwrap();
        client
            .hincrby("y".to_string(), "f".to_string(), 1)
            .await
            .unwrap();
        client
            .batch_del(vec!["x".to_string(), "y".to_string()])
            .await
            .unwrap();
        assert!(client.keys().is_empty());
    }

    #[tokio::test]
    async fn test_queued_failures_are_returned_in_order() {
        let client = MockRedisClient::new()
            .fail_next("get", CustomRedisError::Timeout)
            .fail_next("get", CustomRedisError::ParseError("boom".to_string()));

        assert!(matches!(
            client.get("k".to_string()).await,
            Err(CustomRedisError::Timeout)
        ));
        assert!(matches!(
            client.get("k".to_string()).await,
            Err(CustomRedisError::ParseError(_))
        ));
        assert!(matches!(
            client.get("k".to_string()).await,
            Err(CustomRedisError::NotFound)
        ));
        assert_eq!(client.calls_for("get"), 3);
    }
}
