//! Security utilities: platform keychain access behind a trait seam

pub mod keychain;

pub use keychain::{KeychainError, KeychainProvider, SecretStore};
