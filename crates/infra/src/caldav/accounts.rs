//! Account connection manager
//!
//! Owns, pools, health-tracks, and fails over CalDAV sessions on behalf of
//! every downstream manager. Per alias it keeps at most one cached session,
//! one lock, one circuit breaker, and one health tracker; breaker and health
//! state survive session teardown so a broken connection's history informs
//! the next attempt.
//!
//! ## Locking discipline
//!
//! No session mutation for an alias happens without holding that alias's
//! lock. Accessors acquire the lock *before* evaluating staleness and release
//! it only after any needed reconnect completes; checking staleness outside
//! the lock would let one task destroy another task's freshly created
//! session.

use std::sync::Arc;
use std::time::Duration;

use chronos_common::resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitState, ConnectionHealth,
    HealthSnapshot,
};
use chronos_common::time::{Clock, SystemClock};
use chronos_domain::{AccountStatus, ChronosError, ConnectionConfig, Result};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ConfigStore;
use crate::credentials::CredentialStore;

use super::locks::AccountLockRegistry;
use super::session::{Session, SessionFactory};

/// Shared handle to a cached session
pub type SharedSession<F> =
    Arc<Session<<F as SessionFactory>::Connection, <F as SessionFactory>::Principal>>;

/// Non-throwing connectivity probe result
#[derive(Debug, Clone, Serialize)]
pub struct AccountProbe {
    /// Alias the probe ran against
    pub alias: String,
    /// Whether a session could be established
    pub connected: bool,
    /// Number of calendars enumerated from the principal
    pub calendars: usize,
    /// Sanitized, user-facing error text when the probe failed
    pub error: Option<String>,
}

/// Connection resilience manager for CalDAV accounts
///
/// Downstream calendar/event/task/journal managers call only the accessor
/// operations ([`get_session`](Self::get_session) and friends); they never
/// touch the breaker, health tracker, or lock registry directly.
pub struct AccountManager<F: SessionFactory> {
    config: Arc<ConfigStore>,
    credentials: Arc<CredentialStore>,
    factory: Arc<F>,
    connection: ConnectionConfig,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, SharedSession<F>>,
    locks: AccountLockRegistry,
    // Created on first reference, never removed; they outlive any session
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    health: DashMap<String, Arc<ConnectionHealth>>,
}

impl<F: SessionFactory> AccountManager<F> {
    /// Create a manager using the system clock
    pub fn new(
        config: Arc<ConfigStore>,
        credentials: Arc<CredentialStore>,
        factory: Arc<F>,
        connection: ConnectionConfig,
    ) -> Self {
        Self::with_clock(config, credentials, factory, connection, Arc::new(SystemClock))
    }

    /// Create a manager with an injected clock (useful for testing)
    pub fn with_clock(
        config: Arc<ConfigStore>,
        credentials: Arc<CredentialStore>,
        factory: Arc<F>,
        connection: ConnectionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            credentials,
            factory,
            connection,
            clock,
            sessions: DashMap::new(),
            locks: AccountLockRegistry::new(),
            breakers: DashMap::new(),
            health: DashMap::new(),
        }
    }

    fn breaker_for(&self, alias: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(alias.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::with_clock(
                    CircuitBreakerConfig {
                        failure_threshold: self.connection.failure_threshold,
                        recovery_timeout: self.connection.recovery_timeout,
                    },
                    Arc::clone(&self.clock),
                ))
            })
            .value()
            .clone()
    }

    fn health_for(&self, alias: &str) -> Arc<ConnectionHealth> {
        self.health
            .entry(alias.to_string())
            .or_insert_with(|| Arc::new(ConnectionHealth::new()))
            .value()
            .clone()
    }

    fn cached_session(&self, alias: &str) -> Option<SharedSession<F>> {
        self.sessions.get(alias).map(|entry| entry.value().clone())
    }

    /// Connect to an account, replacing any cached session
    ///
    /// Applies the circuit breaker, credential resolution, and the retry
    /// loop with exponential backoff. Authorization-class failures are never
    /// retried.
    ///
    /// # Errors
    /// - `ChronosError::AccountNotFound` for an unknown alias
    /// - `ChronosError::NoDefaultAccount` when no alias is given and no
    ///   default is configured
    /// - `ChronosError::AccountAuthentication` for missing credentials or an
    ///   auth-class server rejection
    /// - `ChronosError::AccountConnection` when the breaker refuses or all
    ///   attempts fail
    pub async fn connect(&self, alias: Option<&str>) -> Result<SharedSession<F>> {
        let alias = self.config.resolve_alias(alias)?;
        let lock = self.locks.lock_for(&alias);
        let _guard = lock.lock().await;
        self.connect_locked(&alias).await
    }

    /// Connect body; the caller must hold the alias lock
    async fn connect_locked(&self, alias: &str) -> Result<SharedSession<F>> {
        let request_id = Uuid::new_v4();

        let account = self
            .config
            .get_account(alias)
            .ok_or_else(|| ChronosError::AccountNotFound(alias.to_string()))?;

        let breaker = self.breaker_for(alias);
        let health = self.health_for(alias);

        if !breaker.should_allow_request() {
            health.record_attempt();
            health.record_failure();
            error!(
                account = %alias,
                request_id = %request_id,
                "circuit breaker open, rejecting connection attempt"
            );
            return Err(ChronosError::AccountConnection {
                alias: alias.to_string(),
                reason: "circuit breaker is open".to_string(),
            });
        }

        // Advisory limit: only one session is ever cached per alias, so this
        // can only trip when the limit is configured down to one
        if let Some(existing) = self.cached_session(alias) {
            if self.connection.max_connections_per_account <= 1 {
                warn!(account = %alias, "connection limit reached for account");
                if existing.is_stale(self.clock.now(), self.connection.ttl) {
                    self.sessions.remove(alias);
                }
            }
        }

        let password = self
            .credentials
            .get_password(alias, account.password.as_deref())
            .ok_or_else(|| ChronosError::AccountAuthentication(alias.to_string()))?;

        let backoff = BackoffStrategy::Exponential {
            base: self.connection.base_retry_delay,
            max: self.connection.max_retry_delay,
        };

        let mut last_reason = String::new();
        for attempt in 0..self.connection.max_retries {
            health.record_attempt();

            match self
                .factory
                .open(&account.url, &account.username, &password, self.connection.connect_timeout)
                .await
            {
                Ok((connection, principal)) => {
                    let session = Arc::new(Session::new(connection, principal, self.clock.now()));
                    self.sessions.insert(alias.to_string(), Arc::clone(&session));
                    breaker.record_success();
                    health.record_success();
                    self.config.set_status(alias, AccountStatus::Connected);
                    info!(
                        account = %alias,
                        request_id = %request_id,
                        attempt = attempt + 1,
                        "connected to calendar server"
                    );
                    return Ok(session);
                }
                Err(err) if err.is_auth_failure() => {
                    breaker.record_failure();
                    health.record_failure();
                    self.config.set_status(alias, AccountStatus::Error);
                    error!(
                        account = %alias,
                        request_id = %request_id,
                        attempt = attempt + 1,
                        error = %err,
                        "authentication rejected, not retrying"
                    );
                    return Err(ChronosError::AccountAuthentication(alias.to_string()));
                }
                Err(err) => {
                    warn!(
                        account = %alias,
                        request_id = %request_id,
                        attempt = attempt + 1,
                        error = %err,
                        "connection attempt failed"
                    );
                    last_reason = err.to_string();
                    if attempt + 1 < self.connection.max_retries {
                        let delay = backoff.delay_for(attempt);
                        debug!(account = %alias, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        breaker.record_failure();
        health.record_failure();
        self.config.set_status(alias, AccountStatus::Error);
        error!(
            account = %alias,
            request_id = %request_id,
            retries = self.connection.max_retries,
            "all connection attempts failed"
        );
        Err(ChronosError::AccountConnection { alias: alias.to_string(), reason: last_reason })
    }

    /// Get a valid session, transparently reconnecting if absent or stale
    ///
    /// Staleness is evaluated under the alias lock, so concurrent callers
    /// for the same account serialize: one reconnects, the rest observe the
    /// fresh session.
    ///
    /// # Errors
    /// Same failure contract as [`connect`](Self::connect).
    pub async fn get_session(&self, alias: Option<&str>) -> Result<SharedSession<F>> {
        let alias = self.config.resolve_alias(alias)?;
        let lock = self.locks.lock_for(&alias);
        let _guard = lock.lock().await;

        if let Some(session) = self.cached_session(&alias) {
            if !session.is_stale(self.clock.now(), self.connection.ttl) {
                return Ok(session);
            }
            debug!(account = %alias, "cached session is stale, reconnecting");
            self.disconnect_locked(&alias);
        }

        self.connect_locked(&alias).await
    }

    /// Get the connection handle of a valid session
    ///
    /// # Errors
    /// Same failure contract as [`connect`](Self::connect).
    pub async fn get_connection(&self, alias: Option<&str>) -> Result<F::Connection> {
        Ok(self.get_session(alias).await?.connection.clone())
    }

    /// Get the principal handle of a valid session
    ///
    /// # Errors
    /// Same failure contract as [`connect`](Self::connect).
    pub async fn get_principal(&self, alias: Option<&str>) -> Result<F::Principal> {
        Ok(self.get_session(alias).await?.principal.clone())
    }

    /// Remove the cached session and mark the account disconnected
    ///
    /// Breaker and health state stay intact: a disconnect is not a failure
    /// signal.
    ///
    /// # Errors
    /// Returns `ChronosError::NoDefaultAccount` when no alias is given and no
    /// default is configured.
    pub async fn disconnect(&self, alias: Option<&str>) -> Result<()> {
        let alias = self.config.resolve_alias(alias)?;
        let lock = self.locks.lock_for(&alias);
        let _guard = lock.lock().await;
        self.disconnect_locked(&alias);
        Ok(())
    }

    /// Teardown body; the caller must hold the alias lock
    fn disconnect_locked(&self, alias: &str) {
        if self.sessions.remove(alias).is_some() {
            debug!(account = %alias, "session removed from cache");
        }
        self.config.set_status(alias, AccountStatus::Disconnected);
    }

    /// Sweep cached sessions older than `max_age` (default: the configured
    /// TTL), disconnecting each
    ///
    /// Cooperative operation for a periodic external caller; the data path
    /// never invokes it. Returns the number of sessions swept.
    pub async fn cleanup_stale(&self, max_age: Option<Duration>) -> usize {
        let max_age = max_age.unwrap_or(self.connection.ttl);

        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_stale(self.clock.now(), max_age))
            .map(|entry| entry.key().clone())
            .collect();

        let mut swept = 0;
        for alias in candidates {
            let lock = self.locks.lock_for(&alias);
            let _guard = lock.lock().await;
            // Re-check under the lock; another caller may have reconnected
            let still_stale = self
                .cached_session(&alias)
                .is_some_and(|session| session.is_stale(self.clock.now(), max_age));
            if still_stale {
                debug!(account = %alias, "cleaning up stale session");
                self.disconnect_locked(&alias);
                swept += 1;
            }
        }

        if swept > 0 {
            info!(count = swept, "cleaned up stale sessions");
        }
        swept
    }

    /// Test account connectivity and fold the outcome into a structured,
    /// non-throwing result with sanitized error text
    pub async fn test_account(&self, alias: Option<&str>) -> AccountProbe {
        let resolved = match self.config.resolve_alias(alias) {
            Ok(resolved) => resolved,
            Err(err) => {
                return AccountProbe {
                    alias: alias.unwrap_or_default().to_string(),
                    connected: false,
                    calendars: 0,
                    error: Some(err.user_message()),
                };
            }
        };

        match self.connect(Some(&resolved)).await {
            Ok(session) => match self.factory.list_calendars(&session.principal).await {
                Ok(calendars) => AccountProbe {
                    alias: resolved,
                    connected: true,
                    calendars: calendars.len(),
                    error: None,
                },
                Err(err) => {
                    warn!(account = %resolved, error = %err, "calendar enumeration failed");
                    let wrapped = ChronosError::AccountConnection {
                        alias: resolved.clone(),
                        reason: err.to_string(),
                    };
                    AccountProbe {
                        alias: resolved,
                        connected: true,
                        calendars: 0,
                        error: Some(wrapped.user_message()),
                    }
                }
            },
            Err(err) => {
                error!(account = %resolved, error = %err, "test account failed");
                AccountProbe {
                    alias: resolved,
                    connected: false,
                    calendars: 0,
                    error: Some(err.user_message()),
                }
            }
        }
    }

    /// Health snapshot for an account, if it has been referenced
    ///
    /// Read-only diagnostic; tolerates being slightly stale.
    pub fn connection_health(&self, alias: &str) -> Option<HealthSnapshot> {
        self.health.get(alias).map(|entry| entry.value().snapshot())
    }

    /// Circuit breaker state for an account, if it has been referenced
    pub fn breaker_state(&self, alias: &str) -> Option<CircuitState> {
        self.breakers.get(alias).map(|entry| entry.value().state())
    }
}
