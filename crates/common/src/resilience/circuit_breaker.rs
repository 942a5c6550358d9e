//! Per-account circuit breaker
//!
//! The breaker prevents hammering an unreachable or misconfigured server with
//! repeated authentication and network attempts, and bounds the blast radius
//! of a single bad account to that account's alias.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::time::{Clock, SystemClock};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing a trial request to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u64,
    /// Time to wait before transitioning from open to half-open
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(60) }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u64,
    last_failure: Option<Instant>,
}

/// Failure-tolerance state machine gating connection attempts
///
/// `record_success` unconditionally closes the circuit and zeroes the failure
/// counter; the counter therefore tracks consecutive failures only, unlike
/// [`ConnectionHealth`](crate::resilience::ConnectionHealth) whose counters
/// are monotone history.
///
/// The breaker does not limit how many trials run while half-open; the
/// caller's retry discipline is expected to issue one logical trial.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("failure_count", &inner.failure_count)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration using system
    /// clock
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
            clock,
        }
    }

    /// Check whether a request should be allowed through the breaker
    ///
    /// While open, the first call after the recovery timeout has elapsed
    /// transitions the breaker to half-open and returns `true`; earlier calls
    /// return `false` without side effects.
    pub fn should_allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => match inner.last_failure {
                Some(last_failure)
                    if self.clock.now().duration_since(last_failure)
                        >= self.config.recovery_timeout =>
                {
                    inner.state = CircuitState::HalfOpen;
                    debug!("circuit breaker transitioning to half-open for trial request");
                    true
                }
                _ => false,
            },
            CircuitState::HalfOpen => true,
        }
    }

    /// Record a successful operation
    ///
    /// Resets the failure counter and closes the circuit regardless of the
    /// current state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(state = %inner.state, "circuit breaker closed after successful trial");
        }
        inner.failure_count = 0;
        inner.state = CircuitState::Closed;
    }

    /// Record a failed operation
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(self.clock.now());

        let should_open = match inner.state {
            // A half-open trial failure re-opens immediately
            CircuitState::HalfOpen => true,
            _ => inner.failure_count >= self.config.failure_threshold,
        };

        if should_open && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            warn!(failures = inner.failure_count, "circuit breaker opened");
        }
    }

    /// Get the current circuit state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get the current consecutive-failure count
    pub fn failure_count(&self) -> u64 {
        self.inner.lock().failure_count
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
