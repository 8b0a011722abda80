//! Redis cache module
//!
//! Thin wrapper around a multiplexed Redis connection used for short-lived
//! keyed state such as login sessions. Values are stored either as plain
//! strings or as JSON with an optional TTL.

use anyhow::Result;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use tracing::info;

/// Where the session store lives
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:6379`
    pub url: String,
}

impl RedisConfig {
    /// Read `REDIS_URL`, defaulting to a local server
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        Ok(RedisConfig { url })
    }
}

/// Cloneable handle to a Redis server; connections are multiplexed
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Open a client. No connection is made until the first command.
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Store a string, expiring after `ttl_seconds` when given
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        match ttl_seconds {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }

        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    /// Serialize `value` as JSON and store it under `key`
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.set(key, &encoded, ttl_seconds).await
    }

    /// Fetch and decode a JSON value stored under `key`
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Delete a key from Redis, returning whether it existed
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    /// Add `member` to the set at `key` and push the set's expiry out to
    /// `ttl_seconds`
    pub async fn add_to_set(&self, key: &str, member: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    pub async fn remove_from_set(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.srem(key, member).await?;
        Ok(())
    }

    /// `PING` the server
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
        }
    }

    #[tokio::test]
    async fn test_client_rejects_malformed_url() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };
        assert!(RedisPool::new(&config).await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_json_round_trip_with_ttl() -> Result<()> {
        let pool = RedisPool::new(&local_config()).await?;

        let key = "common_cache_test_json";
        pool.set_json(key, &vec!["a", "b"], Some(5)).await?;

        let retrieved: Option<Vec<String>> = pool.get_json(key).await?;
        assert_eq!(retrieved, Some(vec!["a".to_string(), "b".to_string()]));

        assert!(pool.delete(key).await?);
        assert!(!pool.delete(key).await?);
        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis server"]
    async fn test_set_membership() -> Result<()> {
        let pool = RedisPool::new(&local_config()).await?;

        let key = "common_cache_test_set";
        pool.add_to_set(key, "s1", 5).await?;
        pool.add_to_set(key, "s2", 5).await?;
        pool.remove_from_set(key, "s1").await?;

        assert_eq!(pool.set_members(key).await?, vec!["s2".to_string()]);
        assert!(pool.delete(key).await?);
        Ok(())
    }
}
