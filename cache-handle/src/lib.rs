//! # Cache Handle
//!
//! Purpose: Provide a typed, pooled Redis handle with one-time construction
//! and signal-driven pool shutdown.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Every command borrows a pooled connection and
//!    returns it before the call completes.
//! 2. **Typed Values**: Plain text and integers are stored verbatim, structured
//!    values as JSON, chosen at compile time.
//! 3. **Explicit Lifecycle**: Shutdown is a cancellation token the host
//!    observes; the library never exits the process.
//! 4. **Delegated Protocol**: Wire framing and pooling come from `redis` and
//!    `deadpool-redis`.
//!
//! ## Usage
//!
//! ```no_run
//! use cache_handle::{global, CacheConfig};
//!
//! # async fn run() -> cache_handle::CacheResult<()> {
//! let cache = global::init(CacheConfig::new("localhost", 6379, "password", 0))?;
//! cache.set("greeting", "hello", 30).await?;
//! assert_eq!(cache.get_string("greeting").await?.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
pub mod global;
mod hash;
mod pool;
pub mod shutdown;
mod value;

pub use client::{Cache, CacheTtl};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use hash::{flatten, unflatten};
pub use pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use value::{FromStored, Json, ToStored};
