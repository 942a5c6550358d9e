//! CalDAV connection layer
//!
//! The remote-session factory is a port implemented by an external adapter;
//! everything here is protocol-agnostic orchestration: per-account locking,
//! circuit breaking, retry with backoff, and a TTL-bounded session cache.

pub mod accounts;
pub mod locks;
pub mod session;

pub use accounts::{AccountManager, AccountProbe};
pub use locks::AccountLockRegistry;
pub use session::{Session, SessionError, SessionFactory};
