//! Configuration structures
//!
//! [`ChronosConfig`] mirrors the on-disk `accounts.json` shape.
//! [`ConnectionConfig`] carries the tunables of the connection layer; its
//! defaults come from [`crate::constants`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_RETRY_DELAY_MS, BREAKER_FAILURE_THRESHOLD, BREAKER_RECOVERY_TIMEOUT_SECS,
    CONNECTION_TTL_SECS, CONNECT_TIMEOUT_SECS, MAX_CONNECTIONS_PER_ACCOUNT, MAX_CONNECT_RETRIES,
    MAX_RETRY_DELAY_SECS,
};
use crate::types::Account;

/// Main configuration: the set of configured accounts plus the default alias
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronosConfig {
    /// Configured accounts, keyed by alias
    #[serde(default)]
    pub accounts: HashMap<String, Account>,
    /// Default account alias used when a caller omits one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_account: Option<String>,
}

/// Tunables for the connection resilience layer
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Time-to-live of a cached session; staleness is checked lazily on access
    pub ttl: Duration,
    /// Per-attempt timeout handed to the remote-session factory
    pub connect_timeout: Duration,
    /// Maximum connection attempts per `connect` call
    pub max_retries: u32,
    /// Base delay for exponential backoff between attempts
    pub base_retry_delay: Duration,
    /// Cap applied to the exponential backoff delay
    pub max_retry_delay: Duration,
    /// Consecutive failures before the circuit breaker opens
    pub failure_threshold: u64,
    /// Time an open breaker waits before allowing a half-open trial
    pub recovery_timeout: Duration,
    /// Advisory per-account connection limit; only one session is ever cached
    /// per alias, so this is a reserved knob
    pub max_connections_per_account: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(CONNECTION_TTL_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            max_retries: MAX_CONNECT_RETRIES,
            base_retry_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            max_retry_delay: Duration::from_secs(MAX_RETRY_DELAY_SECS),
            failure_threshold: BREAKER_FAILURE_THRESHOLD,
            recovery_timeout: Duration::from_secs(BREAKER_RECOVERY_TIMEOUT_SECS),
            max_connections_per_account: MAX_CONNECTIONS_PER_ACCOUNT,
        }
    }
}
