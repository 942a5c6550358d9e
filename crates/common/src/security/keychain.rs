//! Generic keychain provider for secure credential storage
//!
//! This module exposes a thin wrapper over the platform keychain for storing
//! arbitrary secrets across macOS (Keychain Access), Windows (Credential
//! Manager), and Linux (Secret Service API). The [`SecretStore`] trait is the
//! seam consumers depend on, so tests can inject an in-memory double.

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// Underlying keyring library error
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Storage seam for string secrets
///
/// Implementations must never log secret values.
pub trait SecretStore: Send + Sync {
    /// Retrieve the secret stored under `key`
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if no secret exists for `key`.
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Persist a secret value under `key`, replacing any existing value
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Delete the secret under `key` (idempotent)
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    /// Check if a secret exists under `key`
    fn secret_exists(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }

    /// Short backend identifier for diagnostics (e.g. "keyring", "memory")
    fn backend_name(&self) -> &'static str;
}

/// Platform keychain implementation of [`SecretStore`]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Create a new keychain provider for a specific service
    ///
    /// # Arguments
    /// * `service_name` - Service identifier (e.g., "chronos")
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    fn create_entry(&self, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, key).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {}", e))
        })
    }
}

impl SecretStore for KeychainProvider {
    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        entry.get_password().map_err(|e| {
            if matches!(e, keyring::Error::NoEntry) {
                KeychainError::NotFound
            } else {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {}: {}", key, e))
            }
        })
    }

    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {}: {}", key, e))
        })?;

        Ok(())
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        if let Err(e) = entry.delete_credential() {
            if !matches!(e, keyring::Error::NoEntry) {
                return Err(KeychainError::AccessFailed(format!(
                    "Failed to delete secret for {}: {}",
                    key, e
                )));
            }
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "keyring"
    }
}
