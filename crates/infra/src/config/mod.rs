//! Account configuration: file-backed store and environment overrides

pub mod store;

pub use store::{connection_config_from_env, ConfigStore};
