//! CalDAV account models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Connection status of a configured account
///
/// The connection layer writes this back as a side effect of connection
/// attempts; it never drives connection decisions itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Connected,
    Disconnected,
    Error,
    #[default]
    Unknown,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Connected => write!(f, "connected"),
            AccountStatus::Disconnected => write!(f, "disconnected"),
            AccountStatus::Error => write!(f, "error"),
            AccountStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// CalDAV account configuration
///
/// The password field is optional: when the platform keychain holds the
/// credential, it is stripped from the account record before the record is
/// written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable user-chosen identifier for this account
    ///
    /// Defaults on deserialization: the on-disk map is keyed by alias and the
    /// loader re-injects the key into each record.
    #[serde(default)]
    pub alias: String,
    /// CalDAV server URL
    pub url: Url,
    /// Username for authentication
    pub username: String,
    /// Password (optional if using the keychain)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Display name for the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Connection status, updated by the connection layer
    #[serde(default)]
    pub status: AccountStatus,
    /// Last successful sync time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl Account {
    /// Create an account with the given connection parameters
    ///
    /// Status starts as [`AccountStatus::Unknown`] until the first connection
    /// attempt resolves it.
    pub fn new(alias: impl Into<String>, url: Url, username: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            url,
            username: username.into(),
            password: None,
            display_name: None,
            status: AccountStatus::Unknown,
            last_sync: None,
        }
    }

    /// Set the password (builder style)
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the display name (builder style)
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// One calendar row as enumerated from an account's principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRef {
    /// Server-side calendar path
    pub href: String,
    /// Human-readable calendar name, when the server provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}
