//! In-memory test doubles shared across the workspace

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::security::{KeychainError, SecretStore};

/// In-memory [`SecretStore`] for tests
///
/// Supports an "unavailable" mode that makes every operation fail the way a
/// locked or absent platform keychain would, so credential-fallback paths can
/// be exercised deterministically.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemorySecretStore {
    /// Create an empty, available store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose every operation fails with `AccessFailed`
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.unavailable.store(true, Ordering::Relaxed);
        store
    }

    /// Toggle availability at runtime
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    fn check_available(&self) -> Result<(), KeychainError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(KeychainError::AccessFailed("secret store unavailable".to_string()));
        }
        Ok(())
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.check_available()?;
        self.secrets.lock().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.check_available()?;
        self.secrets.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.check_available()?;
        self.secrets.lock().remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
