//! Redis cache: JSON values, rate-limit counters, and per-wallet locks.

use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::config::{
    Config, CACHE_PREFIX_LOCK, CACHE_PREFIX_RATE_LIMIT, DEFAULT_CACHE_TTL_SECONDS,
    DEFAULT_LOCK_RETRIES, DEFAULT_LOCK_RETRY_DELAY_MS, DEFAULT_LOCK_TTL_SECONDS,
    LOCK_PREFIX_WALLET,
};
use crate::errors::{AppError, AppResult};

/// Increment a window counter, setting its expiry on the first hit.
const RATE_LIMIT_SCRIPT: &str = r#"
    local count = redis.call("INCR", KEYS[1])
    if count == 1 then
        redis.call("EXPIRE", KEYS[1], ARGV[1])
    end
    return {count, redis.call("TTL", KEYS[1])}
"#;

/// Delete the lock only while we still own it.
const RELEASE_LOCK_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

/// Result of counting one request against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub count: u64,
    pub allowed: bool,
    /// Seconds until the window resets
    pub reset_in: u64,
}

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
    default_ttl: u64,
}

impl Cache {
    /// Connect to Redis.
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            connection,
            default_ttl: DEFAULT_CACHE_TTL_SECONDS,
        })
    }

    /// Get a value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(cache_error)?;

        match value {
            Some(json) => {
                let parsed = serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with default TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL (in seconds).
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    /// Round-trip to Redis.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // Rate Limiting
    // =========================================================================

    /// Count one request for `identifier` in a fixed window.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<RateLimitStatus> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let (count, ttl): (i64, i64) = redis::Script::new(RATE_LIMIT_SCRIPT)
            .key(&key)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;

        let count = count.max(0) as u64;
        Ok(RateLimitStatus {
            count,
            allowed: count <= max_requests,
            reset_in: if ttl > 0 { ttl as u64 } else { window_seconds },
        })
    }

    // =========================================================================
    // Distributed Locks
    // =========================================================================

    /// Serialize money-moving requests of one user across instances.
    pub async fn lock_wallet(&self, user_id: Uuid) -> AppResult<LockGuard> {
        let resource = format!("{}{}", LOCK_PREFIX_WALLET, user_id);
        self.acquire_lock_with_options(
            &resource,
            DEFAULT_LOCK_TTL_SECONDS,
            DEFAULT_LOCK_RETRIES,
            DEFAULT_LOCK_RETRY_DELAY_MS,
        )
        .await
    }

    /// Acquire a lock, retrying while another holder has it.
    pub async fn acquire_lock_with_options(
        &self,
        resource: &str,
        ttl_seconds: u64,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> AppResult<LockGuard> {
        let key = format!("{}{}", CACHE_PREFIX_LOCK, resource);
        let lock_id = Uuid::new_v4().to_string();
        let mut conn = self.connection.clone();

        for attempt in 0..=max_retries {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&lock_id)
                .arg("NX")
                .arg("EX")
                .arg(ttl_seconds)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;

            if acquired.is_some() {
                tracing::debug!(resource = %resource, lock_id = %lock_id, "Lock acquired");
                return Ok(LockGuard {
                    cache: Arc::new(self.clone()),
                    key,
                    lock_id,
                    released: false,
                });
            }

            if attempt < max_retries {
                sleep(Duration::from_millis(retry_delay_ms)).await;
            }
        }

        tracing::warn!(resource = %resource, "Failed to acquire lock after retries");
        Err(AppError::invalid_state(
            "Another operation on this wallet is in progress",
        ))
    }

    async fn release_lock(&self, key: &str, lock_id: &str) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let released: i32 = redis::Script::new(RELEASE_LOCK_SCRIPT)
            .key(key)
            .arg(lock_id)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;

        Ok(released == 1)
    }
}

/// RAII guard for distributed locks.
/// Automatically releases the lock when dropped.
pub struct LockGuard {
    cache: Arc<Cache>,
    key: String,
    lock_id: String,
    released: bool,
}

impl LockGuard {
    /// Release the lock now instead of on drop.
    pub async fn release(mut self) -> AppResult<()> {
        self.released = true;
        if self.cache.release_lock(&self.key, &self.lock_id).await? {
            tracing::debug!(key = %self.key, "Lock released");
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let cache = self.cache.clone();
        let key = std::mem::take(&mut self.key);
        let lock_id = std::mem::take(&mut self.lock_id);

        tokio::spawn(async move {
            if let Err(e) = cache.release_lock(&key, &lock_id).await {
                tracing::error!(key = %key, error = %e, "Failed to release lock on drop");
            }
        });
    }
}

fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::internal(format!("Cache error: {}", e))
}
