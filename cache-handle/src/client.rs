//! # Cache Handle
//!
//! Purpose: Expose typed helpers for string, counter, hash and sorted-set
//! commands on top of the connection pool.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Cache` hides pooling and reply decoding.
//! 2. **Scoped Borrowing**: Each call acquires a connection, issues one command
//!    and drops the connection back into the pool before returning.
//! 3. **Explicit Handle**: `Cache` is cheap to clone and is passed to callers;
//!    the process-wide instance in `global` is opt-in.
//! 4. **Fail Fast**: Transport, command and decode failures surface as errors.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use redis::{Cmd, FromRedisValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::hash::{flatten, unflatten};
use crate::pool::ConnectionPool;
use crate::value::{FromStored, Json, ToStored};

/// TTL state returned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

impl CacheTtl {
    /// Maps a raw `TTL` reply: -2 missing, -1 no expiry, otherwise seconds left.
    pub fn from_secs(raw: i64) -> Self {
        match raw {
            -1 => CacheTtl::NoExpiry,
            raw if raw < 0 => CacheTtl::Missing,
            raw => CacheTtl::ExpiresIn(Duration::from_secs(raw as u64)),
        }
    }

    /// Returns the raw `TTL` convention: -2, -1 or the remaining seconds.
    pub fn as_secs(&self) -> i64 {
        match self {
            CacheTtl::Missing => -2,
            CacheTtl::NoExpiry => -1,
            CacheTtl::ExpiresIn(left) => left.as_secs() as i64,
        }
    }
}

struct CacheInner {
    config: CacheConfig,
    pool: ConnectionPool,
    shutdown: CancellationToken,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Pooled cache handle.
///
/// Clones share the same pool. Background tasks owned by the handle stop once
/// the shutdown token is cancelled, which happens on `close`, on a
/// termination signal when a watcher is installed, or when the last clone is
/// dropped.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("addr", &self.inner.config.addr())
            .field("db", &self.inner.config.db)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Cache {
    /// Builds the pool factory for `config`. Connections are dialed lazily.
    ///
    /// When called inside a tokio runtime an idle reaper is spawned that
    /// applies `idle_timeout` and `max_idle` every `reap_interval`.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let pool = ConnectionPool::new(&config)?;
        let shutdown = CancellationToken::new();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(reap_idle_connections(
                    pool.clone(),
                    shutdown.clone(),
                    config.reap_interval,
                ));
            }
            Err(_) => warn!("no tokio runtime, idle connections will not be reaped"),
        }

        info!(
            addr = %config.addr(),
            db = config.db,
            max_size = config.max_size,
            max_idle = config.max_idle,
            "cache pool created"
        );

        Ok(Cache {
            inner: Arc::new(CacheInner {
                config,
                pool,
                shutdown,
            }),
        })
    }

    /// Returns the configuration the pool was built from.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    /// Token cancelled when the cache shuts down. Hosts await it to decide
    /// their own exit strategy.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Closes the pool and cancels the shutdown token. In-flight commands keep
    /// their connections; later calls fail with `CacheError::PoolClosed`.
    pub fn close(&self) {
        if !self.inner.pool.is_closed() {
            info!(addr = %self.inner.config.addr(), "closing cache pool");
        }
        self.inner.pool.close();
        self.inner.shutdown.cancel();
    }

    /// Returns true once the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.pool.is_closed()
    }

    /// Runs a single arbitrary command on a pooled connection.
    pub async fn execute<T: FromRedisValue>(&self, cmd: &Cmd) -> CacheResult<T> {
        let mut conn = self.inner.pool.acquire().await?;
        let reply = cmd.query_async(&mut conn).await?;
        Ok(reply)
    }

    /// Sends `PING` and returns the reply text.
    pub async fn ping(&self) -> CacheResult<String> {
        self.execute(&redis::cmd("PING")).await
    }

    /// Fetches a key and decodes it. Returns `Ok(None)` when the key is missing.
    pub async fn get<T: FromStored>(&self, key: &str) -> CacheResult<Option<T>> {
        let raw: Option<String> = self.execute(redis::cmd("GET").arg(key)).await?;
        raw.map(T::from_stored).transpose()
    }

    /// Fetches a key as text.
    pub async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        self.get(key).await
    }

    /// Fetches a key as an integer.
    pub async fn get_int(&self, key: &str) -> CacheResult<Option<i64>> {
        self.get(key).await
    }

    /// Fetches a key holding JSON text and decodes it into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let value: Option<Json<T>> = self.get(key).await?;
        Ok(value.map(Json::into_inner))
    }

    /// Stores `value` with an expiry of `ttl_secs` seconds using `SETEX`.
    pub async fn set<V: ToStored>(&self, key: &str, value: V, ttl_secs: u64) -> CacheResult<()> {
        let stored = value.to_stored()?;
        self.execute(redis::cmd("SETEX").arg(key).arg(ttl_secs).arg(stored))
            .await
    }

    /// Returns true when the key exists.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.execute(redis::cmd("EXISTS").arg(key)).await
    }

    /// Deletes a key. Returns true when a key was removed.
    pub async fn del(&self, key: &str) -> CacheResult<bool> {
        let removed: i64 = self.execute(redis::cmd("DEL").arg(key)).await?;
        Ok(removed > 0)
    }

    /// Returns the TTL status of a key.
    pub async fn ttl(&self, key: &str) -> CacheResult<CacheTtl> {
        let raw: i64 = self.execute(redis::cmd("TTL").arg(key)).await?;
        Ok(CacheTtl::from_secs(raw))
    }

    /// Sets a time-to-live in seconds. Returns true when the key existed.
    pub async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        self.execute(redis::cmd("EXPIRE").arg(key).arg(ttl_secs))
            .await
    }

    /// Increments a counter by one, creating it at 0 first when missing.
    pub async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.execute(redis::cmd("INCR").arg(key)).await
    }

    /// Increments a counter by `amount`.
    pub async fn incr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.execute(redis::cmd("INCRBY").arg(key).arg(amount))
            .await
    }

    /// Decrements a counter by one.
    pub async fn decr(&self, key: &str) -> CacheResult<i64> {
        self.execute(redis::cmd("DECR").arg(key)).await
    }

    /// Decrements a counter by `amount`.
    pub async fn decr_by(&self, key: &str, amount: i64) -> CacheResult<i64> {
        self.execute(redis::cmd("DECRBY").arg(key).arg(amount))
            .await
    }

    /// Stores the fields of `value` in a hash.
    ///
    /// With `ttl_secs > 0` the fields and the expiry are applied in one
    /// `MULTI`/`EXEC` transaction.
    pub async fn hmset<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> CacheResult<()> {
        let fields = flatten(value)?;
        if fields.is_empty() {
            return Err(CacheError::InvalidValue(format!(
                "hash value for {key:?} has no fields"
            )));
        }

        let mut conn = self.inner.pool.acquire().await?;
        if ttl_secs > 0 {
            let () = redis::pipe()
                .atomic()
                .cmd("HSET")
                .arg(key)
                .arg(&fields)
                .ignore()
                .cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs)
                .ignore()
                .query_async(&mut conn)
                .await?;
        } else {
            let () = redis::cmd("HSET")
                .arg(key)
                .arg(&fields)
                .query_async(&mut conn)
                .await?;
        }
        debug!(key, fields = fields.len(), ttl_secs, "hash stored");
        Ok(())
    }

    /// Reads all fields of a hash into `T`. Returns `Ok(None)` when the hash
    /// is missing or empty.
    pub async fn hmget<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let fields: Vec<(String, String)> = self.execute(redis::cmd("HGETALL").arg(key)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        unflatten(fields).map(Some)
    }

    /// Adds `member` with `score`. Returns the number of members added.
    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> CacheResult<i64> {
        self.execute(redis::cmd("ZADD").arg(key).arg(score).arg(member))
            .await
    }

    /// Rank of `member` by ascending score, or `None` when absent.
    pub async fn zrank(&self, key: &str, member: &str) -> CacheResult<Option<i64>> {
        self.execute(redis::cmd("ZRANK").arg(key).arg(member))
            .await
    }

    /// Rank of `member` by descending score, or `None` when absent.
    pub async fn zrevrank(&self, key: &str, member: &str) -> CacheResult<Option<i64>> {
        self.execute(redis::cmd("ZREVRANK").arg(key).arg(member))
            .await
    }

    /// Members with scores between positions `start` and `stop`, ascending.
    /// Negative positions count from the end.
    pub async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> CacheResult<Vec<(String, f64)>> {
        self.execute(
            redis::cmd("ZRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// Members with scores between positions `start` and `stop`, descending.
    pub async fn zrevrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> CacheResult<Vec<(String, f64)>> {
        self.execute(
            redis::cmd("ZREVRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// Members with `min <= score <= max`, ascending, paginated by
    /// `offset`/`count`.
    pub async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        offset: isize,
        count: isize,
    ) -> CacheResult<Vec<(String, f64)>> {
        self.execute(
            redis::cmd("ZRANGEBYSCORE")
                .arg(key)
                .arg(min)
                .arg(max)
                .arg("WITHSCORES")
                .arg("LIMIT")
                .arg(offset)
                .arg(count),
        )
        .await
    }

    /// Members with `min <= score <= max`, descending, paginated by
    /// `offset`/`count`.
    pub async fn zrevrange_by_score(
        &self,
        key: &str,
        max: f64,
        min: f64,
        offset: isize,
        count: isize,
    ) -> CacheResult<Vec<(String, f64)>> {
        self.execute(
            redis::cmd("ZREVRANGEBYSCORE")
                .arg(key)
                .arg(max)
                .arg(min)
                .arg("WITHSCORES")
                .arg("LIMIT")
                .arg(offset)
                .arg(count),
        )
        .await
    }
}

async fn reap_idle_connections(pool: ConnectionPool, shutdown: CancellationToken, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(10)));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                pool.reap_idle();
            }
        }
    }
}
