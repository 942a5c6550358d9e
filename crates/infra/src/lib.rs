//! # Chronos Infrastructure
//!
//! Adapters and orchestration for the Chronos connection layer.
//!
//! This crate contains:
//! - Account configuration store (file-backed, env bootstrap)
//! - Credential resolution (keychain-first, config fallback)
//! - The CalDAV session factory port and the per-account lock registry
//! - The account connection manager (circuit breaker + retry + session cache)
//!
//! ## Architecture
//! - Depends on `chronos-domain` and `chronos-common`
//! - Downstream calendar/event/task/journal managers consume only the
//!   [`caldav::AccountManager`] accessor surface

pub mod caldav;
pub mod config;
pub mod credentials;

// Re-export commonly used items
pub use caldav::{
    AccountLockRegistry, AccountManager, AccountProbe, Session, SessionError, SessionFactory,
};
pub use config::{connection_config_from_env, ConfigStore};
pub use credentials::{CredentialBackendStatus, CredentialStore};
