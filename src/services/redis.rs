//! Redis cache for the public usage counters
//!
//! The rendered counts live under one key for `ttl_seconds`.

use redis::{AsyncCommands, Client, RedisResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RedisConfig;
use crate::utils::errors::{Result, TimeSkedError};

const COUNTS_KEY: &str = "dashboard:counts";

/// Redis service for short-lived cached values
#[derive(Clone, Debug)]
pub struct RedisService {
    client: Client,
    config: RedisConfig,
}

impl RedisService {
    pub fn new(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(TimeSkedError::Redis)?;
        Ok(Self { client, config })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(TimeSkedError::Redis)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    /// Set a JSON value with the configured TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let serialized = serde_json::to_string(value)?;
        let full_key = self.full_key(key);

        let _: () = conn.set_ex(&full_key, serialized, self.config.ttl_seconds).await?;
        debug!(key = %full_key, ttl = self.config.ttl_seconds, "Value set in Redis");
        Ok(())
    }

    pub async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let mut conn = self.get_connection().await?;
        let full_key = self.full_key(key);

        let result: Option<String> = conn.get(&full_key).await?;
        match result {
            Some(data) => Ok(Some(serde_json::from_str::<T>(&data)?)),
            None => {
                debug!(key = %full_key, "Key not found in Redis");
                Ok(None)
            }
        }
    }

    pub async fn cached_counts<T>(&self) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        self.get(COUNTS_KEY).await
    }

    pub async fn cache_counts<T: Serialize>(&self, counts: &T) -> Result<()> {
        self.set(COUNTS_KEY, counts).await
    }

    pub async fn health_check(&self) -> bool {
        match self.get_connection().await {
            Ok(mut conn) => {
                let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(response) => response == "PONG",
                    Err(e) => {
                        warn!(error = %e, "Redis health check failed");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Redis connection failed");
                false
            }
        }
    }
}
