//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Chronos
///
/// Every failure path of the connection layer ends in one of these typed
/// variants; callers get one uniform contract regardless of whether the
/// breaker, the credential store, or the network caused the failure.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum ChronosError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No default account configured")]
    NoDefaultAccount,

    #[error("Authentication failed for account '{0}'")]
    AccountAuthentication(String),

    #[error("Connection failed for account '{alias}': {reason}")]
    AccountConnection { alias: String, reason: String },

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChronosError {
    /// User-facing-safe message for this error
    ///
    /// Fixed phrasing per variant; never exposes connection reasons, server
    /// hostnames, or backend error text.
    pub fn user_message(&self) -> String {
        match self {
            ChronosError::AccountNotFound(_) => "The specified account was not found.".to_string(),
            ChronosError::NoDefaultAccount => {
                "No default account is configured. Specify an account alias.".to_string()
            }
            ChronosError::AccountAuthentication(_) => {
                "Authentication failed. Please check your credentials.".to_string()
            }
            ChronosError::AccountConnection { .. } => {
                "Could not connect to the calendar server. Please check the server URL."
                    .to_string()
            }
            ChronosError::AccountAlreadyExists(_) => {
                "An account with this name already exists.".to_string()
            }
            ChronosError::Config(_) => {
                "The configuration file is invalid or corrupted.".to_string()
            }
            ChronosError::Credential(_) => "Credential storage is unavailable.".to_string(),
            ChronosError::Internal(_) => "An unexpected internal error occurred.".to_string(),
        }
    }
}

/// Result type alias for Chronos operations
pub type Result<T> = std::result::Result<T, ChronosError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates `ChronosError` display output includes the account alias.
    #[test]
    fn test_error_display() {
        let err = ChronosError::AccountNotFound("work".to_string());
        assert_eq!(err.to_string(), "Account not found: work");

        let err = ChronosError::AccountConnection {
            alias: "work".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("work"));
        assert!(err.to_string().contains("connection refused"));
    }

    /// The sanitized user message must never leak the underlying reason.
    #[test]
    fn test_user_message_strips_internal_detail() {
        let err = ChronosError::AccountConnection {
            alias: "work".to_string(),
            reason: "dns lookup failed for internal-host.corp:8443".to_string(),
        };
        let message = err.user_message();
        assert!(!message.contains("internal-host"));
        assert!(!message.contains("8443"));
        assert!(message.contains("calendar server"));
    }

    /// Validates serde tagging round-trips a struct variant.
    #[test]
    fn test_error_serde_round_trip() {
        let err = ChronosError::AccountAuthentication("work".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"type\":\"AccountAuthentication\""));

        let restored: ChronosError = serde_json::from_str(&json).unwrap();
        assert!(matches!(restored, ChronosError::AccountAuthentication(alias) if alias == "work"));
    }
}
