//! Account configuration store
//!
//! Loads and saves the account set from the config file (JSON or TOML,
//! detected by extension), bootstraps a `default` account from `CALDAV_*`
//! environment variables, and hands passwords off to the secret store so
//! they stay out of the file whenever the keychain is available.
//!
//! ## Environment Variables
//! - `CALDAV_BASE_URL` / `CALDAV_USERNAME` / `CALDAV_PASSWORD`: bootstrap a
//!   `default` account when none is configured
//! - `CHRONOS_CONNECTION_TTL_SECS`: cached-session time-to-live
//! - `CHRONOS_CONNECT_TIMEOUT_SECS`: per-attempt connection timeout
//! - `CHRONOS_MAX_RETRIES`: connection attempts per connect call
//! - `CHRONOS_BASE_RETRY_DELAY_MS`: base backoff delay
//! - `CHRONOS_MAX_RETRY_DELAY_SECS`: backoff cap
//! - `CHRONOS_FAILURE_THRESHOLD`: breaker failure threshold
//! - `CHRONOS_RECOVERY_TIMEOUT_SECS`: breaker recovery timeout
//! - `CHRONOS_MAX_CONNECTIONS_PER_ACCOUNT`: advisory per-account limit

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chronos_domain::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use chronos_domain::{
    Account, AccountStatus, ChronosConfig, ChronosError, ConnectionConfig, Result,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::credentials::CredentialStore;

/// File-backed store for the configured account set
///
/// The connection manager reads accounts through this store and writes
/// status updates back; status changes are in-memory only and are not
/// persisted.
pub struct ConfigStore {
    path: Option<PathBuf>,
    config: RwLock<ChronosConfig>,
    credentials: Arc<CredentialStore>,
}

impl ConfigStore {
    /// Load configuration from `path` (or the default location) and apply the
    /// environment bootstrap
    ///
    /// # Errors
    /// Returns `ChronosError::Config` if the file exists but cannot be read
    /// or parsed, or if no home directory can be resolved for the default
    /// path.
    pub fn load(path: Option<PathBuf>, credentials: Arc<CredentialStore>) -> Result<Self> {
        let path = match path {
            Some(p) => p,
            None => default_config_path()?,
        };

        let mut config = if path.exists() {
            let config = read_config_file(&path)?;
            info!(accounts = config.accounts.len(), path = %path.display(), "Loaded account configuration");
            config
        } else {
            debug!(path = %path.display(), "No config file found, starting empty");
            ChronosConfig::default()
        };

        let env = EnvAccount::from_env();
        bootstrap_env_account(&mut config, &credentials, env);

        Ok(Self { path: Some(path), config: RwLock::new(config), credentials })
    }

    /// Create an empty in-memory store (used by tests and embedders that
    /// manage persistence themselves)
    pub fn in_memory(credentials: Arc<CredentialStore>) -> Self {
        Self { path: None, config: RwLock::new(ChronosConfig::default()), credentials }
    }

    /// Persist the current configuration to disk
    ///
    /// Accounts whose passwords live in the secret store were already
    /// stripped at add time, so the written file carries no secrets unless
    /// the keychain was unavailable.
    ///
    /// # Errors
    /// Returns `ChronosError::Config` on serialization or I/O failure.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("In-memory config store, skipping save");
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChronosError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = self.config.read();
        let serialized = if has_toml_extension(path) {
            toml::to_string_pretty(&*config)
                .map_err(|e| ChronosError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            serde_json::to_string_pretty(&*config)
                .map_err(|e| ChronosError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, serialized)
            .map_err(|e| ChronosError::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Add a new account
    ///
    /// The password is handed to the secret store when possible and stripped
    /// from the persisted record; otherwise it stays in the file with a
    /// warning. The first account added becomes the default.
    ///
    /// # Errors
    /// Returns `ChronosError::AccountAlreadyExists` for a duplicate alias.
    pub fn add_account(&self, mut account: Account) -> Result<()> {
        {
            let mut config = self.config.write();
            if config.accounts.contains_key(&account.alias) {
                return Err(ChronosError::AccountAlreadyExists(account.alias));
            }

            if let Some(password) = account.password.clone() {
                if self.credentials.set_password(&account.alias, &password) {
                    account.password = None;
                } else {
                    warn!(
                        account = %account.alias,
                        "Secret store unavailable, password will be kept in the config file"
                    );
                }
            }

            if config.default_account.is_none() {
                config.default_account = Some(account.alias.clone());
            }
            config.accounts.insert(account.alias.clone(), account);
        }
        self.save()
    }

    /// Remove an account and its stored credential
    ///
    /// # Errors
    /// Returns `ChronosError::AccountNotFound` if the alias is unknown.
    pub fn remove_account(&self, alias: &str) -> Result<()> {
        {
            let mut config = self.config.write();
            if config.accounts.remove(alias).is_none() {
                return Err(ChronosError::AccountNotFound(alias.to_string()));
            }
            self.credentials.delete_password(alias);

            if config.default_account.as_deref() == Some(alias) {
                config.default_account = config.accounts.keys().next().cloned();
            }
        }
        self.save()
    }

    /// Get an account by alias
    pub fn get_account(&self, alias: &str) -> Option<Account> {
        self.config.read().accounts.get(alias).cloned()
    }

    /// Resolve an optional alias to a concrete one
    ///
    /// # Errors
    /// Returns `ChronosError::NoDefaultAccount` when no alias is given and no
    /// default is configured.
    pub fn resolve_alias(&self, alias: Option<&str>) -> Result<String> {
        match alias {
            Some(a) => Ok(a.to_string()),
            None => self.config.read().default_account.clone().ok_or(ChronosError::NoDefaultAccount),
        }
    }

    /// Update the connection status of an account (in-memory only)
    pub fn set_status(&self, alias: &str, status: AccountStatus) {
        let mut config = self.config.write();
        if let Some(account) = config.accounts.get_mut(alias) {
            account.status = status;
        }
    }

    /// The configured default alias, if any
    pub fn default_alias(&self) -> Option<String> {
        self.config.read().default_account.clone()
    }

    /// Change the default alias
    ///
    /// # Errors
    /// Returns `ChronosError::AccountNotFound` if the alias is unknown.
    pub fn set_default_alias(&self, alias: &str) -> Result<()> {
        {
            let mut config = self.config.write();
            if !config.accounts.contains_key(alias) {
                return Err(ChronosError::AccountNotFound(alias.to_string()));
            }
            config.default_account = Some(alias.to_string());
        }
        self.save()
    }

    /// All configured accounts
    pub fn list_accounts(&self) -> Vec<Account> {
        self.config.read().accounts.values().cloned().collect()
    }
}

/// Environment-supplied bootstrap account parameters
struct EnvAccount {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl EnvAccount {
    fn from_env() -> Self {
        Self {
            url: std::env::var("CALDAV_BASE_URL").ok(),
            username: std::env::var("CALDAV_USERNAME").ok(),
            password: std::env::var("CALDAV_PASSWORD").ok(),
        }
    }
}

/// Add a `default` account from the environment when one is not configured
fn bootstrap_env_account(
    config: &mut ChronosConfig,
    credentials: &CredentialStore,
    env: EnvAccount,
) {
    let (Some(url), Some(username)) = (env.url, env.username) else {
        return;
    };
    if config.accounts.contains_key("default") {
        return;
    }

    let url = match Url::parse(&url) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "Ignoring CALDAV_BASE_URL: not a valid URL");
            return;
        }
    };

    let mut account = Account::new("default", url, username)
        .with_display_name("Default Account (from environment)");

    if let Some(password) = env.password {
        if credentials.set_password("default", &password) {
            info!("Environment password stored in the secret store");
        } else {
            account.password = Some(password);
        }
    }

    config.accounts.insert("default".to_string(), account);
    if config.default_account.is_none() {
        config.default_account = Some("default".to_string());
    }
    info!("Added default account from environment variables");
}

fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChronosError::Config("Could not resolve home directory".to_string()))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn has_toml_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn read_config_file(path: &Path) -> Result<ChronosConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ChronosError::Config(format!("Failed to read config file: {}", e)))?;

    let mut config: ChronosConfig = if has_toml_extension(path) {
        toml::from_str(&contents)
            .map_err(|e| ChronosError::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        serde_json::from_str(&contents)
            .map_err(|e| ChronosError::Config(format!("Invalid JSON config: {}", e)))?
    };

    // The map key is authoritative for the alias
    for (alias, account) in &mut config.accounts {
        account.alias = alias.clone();
    }

    Ok(config)
}

/// Build a [`ConnectionConfig`] from defaults plus `CHRONOS_*` overrides
pub fn connection_config_from_env() -> ConnectionConfig {
    connection_config_from_lookup(|key| std::env::var(key).ok())
}

fn connection_config_from_lookup<F>(lookup: F) -> ConnectionConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ConnectionConfig::default();

    if let Some(secs) = parse_var(&lookup, "CHRONOS_CONNECTION_TTL_SECS") {
        config.ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_var(&lookup, "CHRONOS_CONNECT_TIMEOUT_SECS") {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = parse_var(&lookup, "CHRONOS_MAX_RETRIES") {
        config.max_retries = retries;
    }
    if let Some(millis) = parse_var(&lookup, "CHRONOS_BASE_RETRY_DELAY_MS") {
        config.base_retry_delay = Duration::from_millis(millis);
    }
    if let Some(secs) = parse_var(&lookup, "CHRONOS_MAX_RETRY_DELAY_SECS") {
        config.max_retry_delay = Duration::from_secs(secs);
    }
    if let Some(threshold) = parse_var(&lookup, "CHRONOS_FAILURE_THRESHOLD") {
        config.failure_threshold = threshold;
    }
    if let Some(secs) = parse_var(&lookup, "CHRONOS_RECOVERY_TIMEOUT_SECS") {
        config.recovery_timeout = Duration::from_secs(secs);
    }
    if let Some(limit) = parse_var(&lookup, "CHRONOS_MAX_CONNECTIONS_PER_ACCOUNT") {
        config.max_connections_per_account = limit;
    }

    config
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = %key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
