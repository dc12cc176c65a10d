//! Lock helpers shared by the registry and processor crates

use crate::error::Result;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Locks `mutex`, recovering the guard if a previous holder panicked
///
/// The protected state in this workspace (a database connection, a map of
/// descriptors) stays consistent across a panic, so poisoning is logged and
/// ignored.
pub fn recover_mutex<'a, T>(mutex: &'a Mutex<T>, name: &str) -> Result<MutexGuard<'a, T>> {
    Ok(mutex.lock().unwrap_or_else(|poisoned| {
        warn!("{} mutex was poisoned by a panicking thread, recovering", name);
        poisoned.into_inner()
    }))
}
