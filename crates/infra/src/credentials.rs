//! Credential resolution for CalDAV accounts
//!
//! Passwords resolve keychain-first with a config-file fallback. Secret
//! values never appear in log lines; only aliases and backend names do.

use std::sync::Arc;

use chronos_common::security::{KeychainError, SecretStore};
use chronos_domain::constants::CREDENTIAL_KEY_PREFIX;
use serde::Serialize;
use tracing::{debug, error, warn};

/// Diagnostic view of the credential backend
#[derive(Debug, Clone, Serialize)]
pub struct CredentialBackendStatus {
    /// Backend identifier (e.g. "keyring", "memory")
    pub backend: String,
    /// Whether the backend answered a probe without erroring
    pub available: bool,
}

/// Keychain-first credential store for account passwords
///
/// Entry keys follow the pattern `caldav:{alias}`.
pub struct CredentialStore {
    secrets: Arc<dyn SecretStore>,
}

impl CredentialStore {
    /// Create a credential store over the given secret backend
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    fn key(alias: &str) -> String {
        format!("{}{}", CREDENTIAL_KEY_PREFIX, alias)
    }

    /// Resolve the password for an account
    ///
    /// The secret store is consulted first; when it has no entry, the
    /// config-file fallback is used (with a migration warning, since the
    /// secret belongs in the keychain).
    pub fn get_password(&self, alias: &str, fallback: Option<&str>) -> Option<String> {
        match self.secrets.get_secret(&Self::key(alias)) {
            Ok(password) => {
                debug!(account = %alias, "password resolved from secret store");
                Some(password)
            }
            Err(KeychainError::NotFound) => {
                if fallback.is_some() {
                    warn!(
                        account = %alias,
                        "password found in config file but not in the secret store; \
                         re-add the account to migrate it"
                    );
                }
                fallback.map(str::to_owned)
            }
            Err(e) => {
                error!(account = %alias, error = %e, "secret store lookup failed");
                fallback.map(str::to_owned)
            }
        }
    }

    /// Store a password in the secret backend
    ///
    /// Returns `true` when the secret was persisted; `false` means the caller
    /// should keep the password in its own record.
    pub fn set_password(&self, alias: &str, password: &str) -> bool {
        match self.secrets.set_secret(&Self::key(alias), password) {
            Ok(()) => {
                debug!(account = %alias, "password stored in secret store");
                true
            }
            Err(e) => {
                warn!(account = %alias, error = %e, "failed to store password in secret store");
                false
            }
        }
    }

    /// Remove a stored password (idempotent)
    pub fn delete_password(&self, alias: &str) -> bool {
        match self.secrets.delete_secret(&Self::key(alias)) {
            Ok(()) => true,
            Err(e) => {
                warn!(account = %alias, error = %e, "failed to delete password from secret store");
                false
            }
        }
    }

    /// Probe the backend for diagnostics
    pub fn backend_status(&self) -> CredentialBackendStatus {
        // A missing probe entry still proves the backend answers
        let available = match self.secrets.get_secret(&Self::key("__probe__")) {
            Ok(_) | Err(KeychainError::NotFound) => true,
            Err(_) => false,
        };
        CredentialBackendStatus { backend: self.secrets.backend_name().to_string(), available }
    }
}
