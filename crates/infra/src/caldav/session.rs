//! Session factory port and the cached session entry

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chronos_domain::CalendarRef;
use thiserror::Error;
use url::Url;

/// Failures surfaced by the remote-session factory
#[derive(Debug, Error)]
pub enum SessionError {
    /// The server rejected the credentials; never retried
    #[error("authorization rejected: {0}")]
    Unauthorized(String),

    /// The connection attempt exceeded its timeout
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Any other network or server failure
    #[error("remote error: {0}")]
    Remote(String),
}

impl SessionError {
    /// Whether this failure is authorization-class (and must not be retried)
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SessionError::Unauthorized(_))
    }
}

/// Externally supplied capability for opening authenticated CalDAV sessions
///
/// Implementations own the wire protocol; the connection layer never builds
/// a session any other way. `open` must honor `timeout` for the whole
/// connect-and-fetch-principal exchange and distinguish authorization-class
/// rejections from other failures.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    /// Authenticated connection handle
    type Connection: Clone + Send + Sync + 'static;
    /// Entry-point handle from which calendars are enumerated
    type Principal: Clone + Send + Sync + 'static;

    /// Establish a connection and fetch the account principal
    async fn open(
        &self,
        url: &Url,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<(Self::Connection, Self::Principal), SessionError>;

    /// Enumerate the calendars reachable from a principal
    async fn list_calendars(
        &self,
        principal: &Self::Principal,
    ) -> Result<Vec<CalendarRef>, SessionError>;
}

/// One cached, authenticated session for an account
///
/// At most one live instance exists per alias, owned by the account manager.
/// Staleness is a lazy property checked on access, not an active eviction.
#[derive(Debug)]
pub struct Session<C, P> {
    /// Authenticated connection handle
    pub connection: C,
    /// Principal handle for calendar enumeration
    pub principal: P,
    created_at: Instant,
}

impl<C, P> Session<C, P> {
    /// Wrap a freshly opened connection with its creation timestamp
    pub fn new(connection: C, principal: P, created_at: Instant) -> Self {
        Self { connection, principal, created_at }
    }

    /// When this session was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Age of this session as of `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Whether this session has outlived `ttl` as of `now`
    pub fn is_stale(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) > ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `SessionError::is_auth_failure` classification.
    #[test]
    fn test_auth_failure_classification() {
        assert!(SessionError::Unauthorized("401".to_string()).is_auth_failure());
        assert!(!SessionError::Timeout(Duration::from_secs(30)).is_auth_failure());
        assert!(!SessionError::Remote("503".to_string()).is_auth_failure());
    }

    /// Validates `Session::is_stale` behavior around the TTL boundary.
    #[test]
    fn test_session_staleness() {
        let created = Instant::now();
        let session = Session::new((), (), created);
        let ttl = Duration::from_secs(60);

        assert!(!session.is_stale(created, ttl));
        assert!(!session.is_stale(created + Duration::from_secs(60), ttl));
        assert!(session.is_stale(created + Duration::from_secs(61), ttl));
    }

    /// Age saturates rather than panicking for a timestamp in the future.
    #[test]
    fn test_session_age_saturates() {
        let created = Instant::now() + Duration::from_secs(10);
        let session = Session::new((), (), created);
        assert_eq!(session.age(Instant::now()), Duration::ZERO);
    }
}
