//! # Cache Errors
//!
//! Purpose: Give every failure path of the handle one typed error so callers
//! can tell transport problems from rejected commands and bad payloads.

use deadpool_redis::PoolError;
use redis::{ErrorKind, RedisError};
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the cache handle.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Dial, AUTH or SELECT failed, or the connection dropped mid-command.
    #[error("connection error: {0}")]
    Connection(String),
    /// No pooled connection became available within the wait timeout.
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,
    /// The pool was closed by `Cache::close` or the termination watcher.
    #[error("connection pool is closed")]
    PoolClosed,
    /// The store answered with an error reply.
    #[error("command failed: {0}")]
    Command(String),
    /// A reply or stored payload could not be decoded into the requested type.
    #[error("decode error: {0}")]
    Decode(String),
    /// A value could not be encoded for storage.
    #[error("serialize error: {0}")]
    Serialize(String),
    /// The value has a shape the requested command cannot store.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// The pool could not be built from the configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<RedisError> for CacheError {
    fn from(err: RedisError) -> Self {
        if err.kind() == ErrorKind::TypeError {
            CacheError::Decode(err.to_string())
        } else if err.is_connection_refusal()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_io_error()
            || err.kind() == ErrorKind::AuthenticationFailed
        {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

impl From<PoolError> for CacheError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Timeout(_) => CacheError::PoolTimeout,
            PoolError::Closed => CacheError::PoolClosed,
            PoolError::Backend(err) => CacheError::Connection(err.to_string()),
            other => CacheError::Connection(other.to_string()),
        }
    }
}
