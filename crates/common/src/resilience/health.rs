//! Per-account connection health telemetry
//!
//! Counters here are monotone history for operators and diagnostics; they are
//! never reset by the circuit breaker, whose own counter tracks consecutive
//! failures and zeroes on success.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Rolling counters of connection attempts for one account
///
/// All updates are lock-free except the wall-clock timestamps. Reads used for
/// reporting tolerate being slightly stale.
#[derive(Debug, Default)]
pub struct ConnectionHealth {
    total_attempts: AtomicU64,
    successful_connections: AtomicU64,
    failed_connections: AtomicU64,
    last_success: Mutex<Option<DateTime<Utc>>>,
    last_failure: Mutex<Option<DateTime<Utc>>>,
}

/// Read-only view of [`ConnectionHealth`] for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub total_attempts: u64,
    pub successful_connections: u64,
    pub failed_connections: u64,
    pub success_rate: f64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
}

impl ConnectionHealth {
    /// Create a tracker with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a connection attempt was started
    pub fn record_attempt(&self) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful connection
    pub fn record_success(&self) {
        self.successful_connections.fetch_add(1, Ordering::Relaxed);
        *self.last_success.lock() = Some(Utc::now());
    }

    /// Record a failed connection
    pub fn record_failure(&self) {
        self.failed_connections.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(Utc::now());
    }

    /// Total connection attempts recorded
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts.load(Ordering::Relaxed)
    }

    /// Successful connections recorded
    pub fn successful_connections(&self) -> u64 {
        self.successful_connections.load(Ordering::Relaxed)
    }

    /// Failed connections recorded
    pub fn failed_connections(&self) -> u64 {
        self.failed_connections.load(Ordering::Relaxed)
    }

    /// Fraction of attempts that succeeded; `1.0` when no attempts were made
    pub fn success_rate(&self) -> f64 {
        let total = self.total_attempts();
        if total == 0 {
            return 1.0;
        }
        self.successful_connections() as f64 / total as f64
    }

    /// Take a consistent-enough snapshot for reporting
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            total_attempts: self.total_attempts(),
            successful_connections: self.successful_connections(),
            failed_connections: self.failed_connections(),
            success_rate: self.success_rate(),
            last_success: *self.last_success.lock(),
            last_failure: *self.last_failure.lock(),
        }
    }
}
