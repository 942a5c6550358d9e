//! Integration tests for the account connection manager
//!
//! Drives `AccountManager` end to end with a scripted mock session factory:
//! retry and backoff, the never-retry rule for auth failures, circuit
//! breaker refusal and recovery, TTL staleness, the per-alias locking
//! discipline under concurrency, and the non-throwing probe.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chronos_common::testing::MemorySecretStore;
use chronos_common::time::MockClock;
use chronos_common::CircuitState;
use chronos_domain::{Account, AccountStatus, CalendarRef, ChronosError, ConnectionConfig};
use chronos_infra::caldav::{AccountManager, SessionError, SessionFactory};
use chronos_infra::config::ConfigStore;
use chronos_infra::credentials::CredentialStore;
use parking_lot::Mutex;
use url::Url;

const PASSWORD: &str = "hunter2";

#[derive(Debug, Clone)]
struct MockConnection {
    id: u64,
}

#[derive(Debug, Clone)]
struct MockPrincipal {
    calendars: usize,
}

/// Scripted outcome for one `open` call; an empty script means success.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Ok,
    Unauthorized,
    Unavailable,
}

#[derive(Debug, Default)]
struct MockFactory {
    opens: AtomicU64,
    script: Mutex<VecDeque<Outcome>>,
    calendars: usize,
}

impl MockFactory {
    fn scripted(outcomes: Vec<Outcome>) -> Self {
        Self { opens: AtomicU64::new(0), script: Mutex::new(outcomes.into()), calendars: 2 }
    }

    fn push(&self, outcome: Outcome) {
        self.script.lock().push_back(outcome);
    }

    fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    type Connection = MockConnection;
    type Principal = MockPrincipal;

    async fn open(
        &self,
        _url: &Url,
        _username: &str,
        password: &str,
        _timeout: Duration,
    ) -> Result<(MockConnection, MockPrincipal), SessionError> {
        let id = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if password != PASSWORD {
            return Err(SessionError::Unauthorized("401 Unauthorized".to_string()));
        }
        match self.script.lock().pop_front().unwrap_or(Outcome::Ok) {
            Outcome::Ok => {
                Ok((MockConnection { id }, MockPrincipal { calendars: self.calendars }))
            }
            Outcome::Unauthorized => Err(SessionError::Unauthorized("401 Unauthorized".to_string())),
            Outcome::Unavailable => Err(SessionError::Remote("connection refused".to_string())),
        }
    }

    async fn list_calendars(
        &self,
        principal: &MockPrincipal,
    ) -> Result<Vec<CalendarRef>, SessionError> {
        Ok((0..principal.calendars)
            .map(|i| CalendarRef { href: format!("/calendars/{}/", i), display_name: None })
            .collect())
    }
}

struct Harness {
    manager: Arc<AccountManager<MockFactory>>,
    factory: Arc<MockFactory>,
    config: Arc<ConfigStore>,
    clock: MockClock,
}

fn fast_config() -> ConnectionConfig {
    ConnectionConfig {
        ttl: Duration::from_secs(60),
        connect_timeout: Duration::from_secs(5),
        max_retries: 3,
        base_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(8),
        failure_threshold: 5,
        recovery_timeout: Duration::from_secs(60),
        max_connections_per_account: 3,
    }
}

fn harness(connection: ConnectionConfig, script: Vec<Outcome>) -> Harness {
    let credentials = Arc::new(CredentialStore::new(Arc::new(MemorySecretStore::new())));
    let config = Arc::new(ConfigStore::in_memory(Arc::clone(&credentials)));
    let factory = Arc::new(MockFactory::scripted(script));
    let clock = MockClock::new();

    let manager = Arc::new(AccountManager::with_clock(
        Arc::clone(&config),
        credentials,
        Arc::clone(&factory),
        connection,
        Arc::new(clock.clone()),
    ));

    Harness { manager, factory, config, clock }
}

fn add_account(config: &ConfigStore, alias: &str) {
    let url = Url::parse("https://caldav.example.com/dav/").unwrap();
    config.add_account(Account::new(alias, url, "alice").with_password(PASSWORD)).unwrap();
}

#[tokio::test]
async fn connect_success_caches_session_and_updates_state() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");

    let session = h.manager.connect(Some("work")).await.unwrap();
    assert_eq!(session.principal.calendars, 2);
    assert_eq!(h.factory.opens(), 1);
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Connected);
    assert_eq!(h.manager.breaker_state("work"), Some(CircuitState::Closed));

    let health = h.manager.connection_health("work").unwrap();
    assert_eq!(health.total_attempts, 1);
    assert_eq!(health.successful_connections, 1);
    assert_eq!(health.failed_connections, 0);
    assert_eq!(health.success_rate, 1.0);
}

#[tokio::test]
async fn auth_failure_is_never_retried() {
    let h = harness(fast_config(), vec![Outcome::Unauthorized]);
    add_account(&h.config, "work");

    let err = h.manager.connect(Some("work")).await.unwrap_err();
    assert!(matches!(err, ChronosError::AccountAuthentication(alias) if alias == "work"));

    // Exactly one attempt: no retries for auth-class failures
    assert_eq!(h.factory.opens(), 1);
    let health = h.manager.connection_health("work").unwrap();
    assert_eq!(health.total_attempts, 1);
    assert_eq!(health.failed_connections, 1);
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Error);
}

#[tokio::test]
async fn transient_failure_succeeds_on_second_attempt() {
    let h = harness(fast_config(), vec![Outcome::Unavailable, Outcome::Ok]);
    add_account(&h.config, "work");

    h.manager.connect(Some("work")).await.unwrap();

    assert_eq!(h.factory.opens(), 2);
    let health = h.manager.connection_health("work").unwrap();
    assert_eq!(health.total_attempts, 2);
    assert_eq!(health.successful_connections, 1);
    assert_eq!(h.manager.breaker_state("work"), Some(CircuitState::Closed));
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Connected);
}

#[tokio::test]
async fn exhausted_retries_raise_connection_error() {
    let h = harness(
        fast_config(),
        vec![Outcome::Unavailable, Outcome::Unavailable, Outcome::Unavailable],
    );
    add_account(&h.config, "work");

    let err = h.manager.connect(Some("work")).await.unwrap_err();
    assert!(matches!(err, ChronosError::AccountConnection { ref alias, .. } if alias == "work"));

    assert_eq!(h.factory.opens(), 3);
    let health = h.manager.connection_health("work").unwrap();
    assert_eq!(health.total_attempts, 3);
    assert_eq!(health.failed_connections, 1, "only exhaustion records a failure");
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Error);
}

#[tokio::test]
async fn open_breaker_refuses_without_network_attempt() {
    let mut connection = fast_config();
    connection.failure_threshold = 2;
    connection.max_retries = 1;
    let h = harness(connection, vec![Outcome::Unavailable, Outcome::Unavailable]);
    add_account(&h.config, "work");

    for _ in 0..2 {
        let _ = h.manager.connect(Some("work")).await.unwrap_err();
    }
    assert_eq!(h.manager.breaker_state("work"), Some(CircuitState::Open));
    assert_eq!(h.factory.opens(), 2);

    // Refusal is surfaced as a typed connection error, with no factory call
    let err = h.manager.connect(Some("work")).await.unwrap_err();
    assert!(matches!(err, ChronosError::AccountConnection { .. }));
    assert_eq!(h.factory.opens(), 2);

    let health = h.manager.connection_health("work").unwrap();
    assert_eq!(health.total_attempts, 3);
    assert_eq!(health.failed_connections, 3);
}

#[tokio::test]
async fn breaker_allows_trial_after_recovery_timeout() {
    let mut connection = fast_config();
    connection.failure_threshold = 1;
    connection.max_retries = 1;
    let h = harness(connection, vec![Outcome::Unavailable]);
    add_account(&h.config, "work");

    let _ = h.manager.connect(Some("work")).await.unwrap_err();
    assert_eq!(h.manager.breaker_state("work"), Some(CircuitState::Open));

    h.clock.advance_secs(61);
    h.factory.push(Outcome::Ok);
    h.manager.connect(Some("work")).await.unwrap();

    assert_eq!(h.manager.breaker_state("work"), Some(CircuitState::Closed));
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Connected);
}

#[tokio::test]
async fn stale_session_triggers_exactly_one_reconnect() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");

    let first = h.manager.get_session(Some("work")).await.unwrap();
    assert_eq!(h.factory.opens(), 1);

    // Within the TTL the cached session is reused
    h.clock.advance_secs(30);
    let again = h.manager.get_session(Some("work")).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(h.factory.opens(), 1);

    // Past the TTL a single reconnect produces a newer session
    h.clock.advance_secs(31);
    let fresh = h.manager.get_session(Some("work")).await.unwrap();
    assert_eq!(h.factory.opens(), 2);
    assert!(fresh.created_at() > first.created_at());
    assert_eq!(h.manager.connection_health("work").unwrap().total_attempts, 2);
}

#[tokio::test]
async fn concurrent_cold_calls_share_one_connect() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&h.manager);
        handles.push(tokio::spawn(async move {
            manager.get_session(Some("work")).await.unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().connection.id);
    }

    assert_eq!(h.factory.opens(), 1, "cold cache must connect exactly once");
    assert!(ids.iter().all(|id| *id == ids[0]), "all callers observe the same session");
    assert_eq!(h.manager.connection_health("work").unwrap().total_attempts, 1);
}

#[tokio::test]
async fn disconnect_then_get_session_reconnects() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");

    h.manager.connect(Some("work")).await.unwrap();
    h.manager.disconnect(Some("work")).await.unwrap();
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Disconnected);

    h.manager.get_session(Some("work")).await.unwrap();
    assert_eq!(h.factory.opens(), 2);
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Connected);
}

#[tokio::test]
async fn breaker_and_health_survive_disconnect() {
    let h = harness(fast_config(), vec![Outcome::Unavailable, Outcome::Ok]);
    add_account(&h.config, "work");

    h.manager.connect(Some("work")).await.unwrap();
    h.manager.disconnect(Some("work")).await.unwrap();

    // History from before the teardown is still visible
    let health = h.manager.connection_health("work").unwrap();
    assert_eq!(health.total_attempts, 2);
    assert_eq!(h.manager.breaker_state("work"), Some(CircuitState::Closed));
}

#[tokio::test]
async fn unknown_alias_and_missing_default_are_typed_errors() {
    let h = harness(fast_config(), vec![]);

    let err = h.manager.connect(Some("nope")).await.unwrap_err();
    assert!(matches!(err, ChronosError::AccountNotFound(alias) if alias == "nope"));

    let err = h.manager.get_session(None).await.unwrap_err();
    assert!(matches!(err, ChronosError::NoDefaultAccount));
    assert_eq!(h.factory.opens(), 0);
}

#[tokio::test]
async fn omitted_alias_resolves_to_default_account() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");

    let principal = h.manager.get_principal(None).await.unwrap();
    assert_eq!(principal.calendars, 2);

    let connection = h.manager.get_connection(None).await.unwrap();
    assert_eq!(connection.id, 1);
    assert_eq!(h.factory.opens(), 1);
}

#[tokio::test]
async fn missing_password_fails_before_any_attempt() {
    let h = harness(fast_config(), vec![]);
    let url = Url::parse("https://caldav.example.com/dav/").unwrap();
    h.config.add_account(Account::new("work", url, "alice")).unwrap();

    let err = h.manager.connect(Some("work")).await.unwrap_err();
    assert!(matches!(err, ChronosError::AccountAuthentication(_)));
    assert_eq!(h.factory.opens(), 0);
}

#[tokio::test]
async fn cleanup_stale_sweeps_only_expired_sessions() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");
    add_account(&h.config, "home");

    h.manager.connect(Some("work")).await.unwrap();
    h.clock.advance_secs(45);
    h.manager.connect(Some("home")).await.unwrap();

    // Only "work" has outlived the 60s TTL at this point
    h.clock.advance_secs(20);
    let swept = h.manager.cleanup_stale(None).await;
    assert_eq!(swept, 1);
    assert_eq!(h.config.get_account("work").unwrap().status, AccountStatus::Disconnected);
    assert_eq!(h.config.get_account("home").unwrap().status, AccountStatus::Connected);

    // The sweep is idempotent until something else goes stale
    assert_eq!(h.manager.cleanup_stale(None).await, 0);
}

#[tokio::test]
async fn test_account_probe_reports_calendar_count() {
    let h = harness(fast_config(), vec![]);
    add_account(&h.config, "work");

    let probe = h.manager.test_account(Some("work")).await;
    assert_eq!(probe.alias, "work");
    assert!(probe.connected);
    assert_eq!(probe.calendars, 2);
    assert!(probe.error.is_none());
}

#[tokio::test]
async fn test_account_probe_sanitizes_failures() {
    let h = harness(fast_config(), vec![Outcome::Unauthorized]);
    add_account(&h.config, "work");

    let probe = h.manager.test_account(Some("work")).await;
    assert!(!probe.connected);
    assert_eq!(probe.calendars, 0);

    let error = probe.error.unwrap();
    assert!(error.contains("credentials"), "probe error should be the user-facing message");
    assert!(!error.contains("401"), "probe error must not leak backend detail");
}

#[tokio::test]
async fn probe_without_default_account_folds_the_error() {
    let h = harness(fast_config(), vec![]);

    let probe = h.manager.test_account(None).await;
    assert!(!probe.connected);
    assert!(probe.error.unwrap().contains("default account"));
}
