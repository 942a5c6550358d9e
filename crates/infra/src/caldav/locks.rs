//! Per-account lock registry
//!
//! One mutual-exclusion lock per alias serializes all session mutation for
//! that account. Entries are created lazily on first reference and are never
//! removed: deleting a lock while another task may be waiting on it is a
//! lost-wakeup hazard, so reuse is the only safe policy.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

/// Registry of per-alias locks, retained for the registry's lifetime
#[derive(Debug, Default)]
pub struct AccountLockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AccountLockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for an alias, creating it on first reference
    ///
    /// The returned `Arc` stays valid even if the session it guards is torn
    /// down; the registry entry itself is never deleted.
    pub fn lock_for(&self, alias: &str) -> Arc<Mutex<()>> {
        self.locks.entry(alias.to_string()).or_default().value().clone()
    }

    /// Number of aliases that have been referenced so far
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no alias has been referenced yet
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
