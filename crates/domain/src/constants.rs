//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Connection lifecycle
pub const CONNECTION_TTL_SECS: u64 = 30 * 60;
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
pub const MAX_CONNECT_RETRIES: u32 = 3;
pub const BASE_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_SECS: u64 = 30;
pub const MAX_CONNECTIONS_PER_ACCOUNT: usize = 3;

// Circuit breaker defaults
pub const BREAKER_FAILURE_THRESHOLD: u64 = 5;
pub const BREAKER_RECOVERY_TIMEOUT_SECS: u64 = 60;

// Credential storage
pub const KEYCHAIN_SERVICE: &str = "chronos";
pub const CREDENTIAL_KEY_PREFIX: &str = "caldav:";

// Configuration file location (relative to the home directory)
pub const CONFIG_DIR_NAME: &str = ".chronos";
pub const CONFIG_FILE_NAME: &str = "accounts.json";
