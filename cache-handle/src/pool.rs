//! # Connection Pool
//!
//! Purpose: Build the pooled-connection factory in front of the store and
//! keep its idle set bounded.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections instead of dialing per command.
//! 2. **Delegated Internals**: Dialing, `AUTH`, `SELECT` and the `PING` health
//!    check on reuse are done by `redis` and `deadpool-redis`.
//! 3. **Bounded Idle Set**: `reap_idle` drops stale connections and caps how
//!    many idle ones survive.
//! 4. **Fail Fast**: Dial failures surface to the borrower that needed them.

use std::cell::Cell;

use deadpool_redis::{Manager, Pool, Runtime};
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};

/// Connection borrowed from the pool; returned to it on drop.
pub type PooledConnection = deadpool_redis::Connection;

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Maximum number of live connections.
    pub max_size: usize,
    /// Live connections (idle + in-use).
    pub size: usize,
    /// Idle connections ready to be borrowed.
    pub available: usize,
    /// Borrowers waiting for a connection.
    pub waiting: usize,
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Pool,
    max_idle: usize,
    idle_timeout: std::time::Duration,
}

impl ConnectionPool {
    /// Creates the pool. No connection is dialed until the first `acquire`.
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        let manager = Manager::new(connection_info(config))?;
        let inner = Pool::builder(manager)
            .max_size(config.max_size.max(1))
            .wait_timeout(config.wait_timeout)
            .create_timeout(config.connect_timeout)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|err| CacheError::Config(err.to_string()))?;

        Ok(ConnectionPool {
            inner,
            max_idle: config.max_idle,
            idle_timeout: config.idle_timeout,
        })
    }

    /// Borrows a connection, dialing a new one when no healthy idle one exists.
    pub async fn acquire(&self) -> CacheResult<PooledConnection> {
        Ok(self.inner.get().await?)
    }

    /// Closes idle connections older than the idle timeout and trims the idle
    /// set to `max_idle`. Returns the number of connections closed.
    pub fn reap_idle(&self) -> usize {
        let kept = Cell::new(0usize);
        let removed = self
            .inner
            .retain(|_, metrics| {
                let keep = metrics.last_used() < self.idle_timeout && kept.get() < self.max_idle;
                if keep {
                    kept.set(kept.get() + 1);
                }
                keep
            })
            .removed
            .len();

        if removed > 0 {
            debug!(removed, kept = kept.get(), "reaped idle connections");
        }
        removed
    }

    /// Closes the pool. Idle connections are dropped and later borrows fail.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Returns the current pool counters.
    pub fn status(&self) -> PoolStatus {
        let status = self.inner.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available as usize,
            waiting: status.waiting,
        }
    }
}

fn connection_info(config: &CacheConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.password.clone(),
            ..RedisConnectionInfo::default()
        },
    }
}
