//! # Process-wide Instance
//!
//! Purpose: Offer a single shared `Cache` for programs that do not thread the
//! handle through their own state.
//!
//! ## Design Principles
//! 1. **Run Once**: The first `init` builds the pool; concurrent callers wait
//!    on the init lock and all observe the same instance.
//! 2. **Idempotent**: Later `init` calls return the existing instance and
//!    ignore their configuration.
//! 3. **No Silent Defaults**: `instance` before `init` is a programming error
//!    and panics.

use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::{debug, warn};

use crate::client::Cache;
use crate::config::CacheConfig;
use crate::error::CacheResult;
use crate::shutdown::spawn_termination_watcher;

static INSTANCE: OnceLock<Cache> = OnceLock::new();
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Builds the process-wide cache on first call and returns it.
///
/// Inside a tokio runtime the first call also installs the termination
/// watcher, which closes the pool on Ctrl+C or SIGTERM.
pub fn init(config: CacheConfig) -> CacheResult<&'static Cache> {
    if let Some(cache) = INSTANCE.get() {
        return Ok(cache);
    }

    let _guard = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(cache) = INSTANCE.get() {
        debug!("cache already initialized by a concurrent caller");
        return Ok(cache);
    }

    let cache = Cache::new(config)?;
    if tokio::runtime::Handle::try_current().is_ok() {
        spawn_termination_watcher(&cache);
    } else {
        warn!("no tokio runtime, termination watcher not installed");
    }

    Ok(INSTANCE.get_or_init(|| cache))
}

/// Returns the process-wide cache.
///
/// # Panics
///
/// Panics if `init` has not completed.
pub fn instance() -> &'static Cache {
    match INSTANCE.get() {
        Some(cache) => cache,
        None => panic!("cache instance requested before global::init"),
    }
}

/// Returns the process-wide cache if `init` has completed.
pub fn try_instance() -> Option<&'static Cache> {
    INSTANCE.get()
}
