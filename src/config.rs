use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::errors::DomainError;
use crate::domain::models::secret::KNOWN_SERVICES;

/// Minimum salt length accepted by the key derivation function.
pub const MIN_SALT_LEN: usize = 8;

/// Which store backend to construct. Selected exactly once, in
/// [`crate::VaultState::new`].
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Whole-vault envelope encrypted into a single file.
    LocalFile { vault_file: PathBuf },
    /// Ephemeral map, no persistence. Tests and development.
    InMemory,
    /// Network-backed store speaking the same contract.
    Remote { base_url: String },
}

/// Argon2id cost parameters for passphrase key derivation.
#[derive(Debug, Clone)]
pub struct KdfParams {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// 保险库配置：列出每个可识别选项及其默认值，构造后立即校验
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub passphrase: String,
    pub salt: String,
    pub backend: StoreBackend,
    /// Token cache TTL for the provider facade.
    pub cache_ttl: Duration,
    /// Deadline applied to every remote-backend call.
    pub remote_timeout: Duration,
    pub kdf: KdfParams,
    /// Snapshot of legacy configuration variables (name -> value). Captured
    /// once at construction; the facade never reads the process environment
    /// directly.
    pub legacy_values: HashMap<String, String>,
}

impl VaultConfig {
    pub fn new(
        passphrase: impl Into<String>,
        salt: impl Into<String>,
        backend: StoreBackend,
    ) -> Self {
        Self {
            passphrase: passphrase.into(),
            salt: salt.into(),
            backend,
            cache_ttl: Duration::from_secs(300),
            remote_timeout: Duration::from_secs(10),
            kdf: KdfParams::default(),
            legacy_values: HashMap::new(),
        }
    }

    /// 从进程环境一次性捕获旧版配置变量
    pub fn capture_legacy_env(mut self) -> Self {
        for service in KNOWN_SERVICES {
            if let Ok(value) = std::env::var(service.legacy_var) {
                if !value.is_empty() {
                    self.legacy_values
                        .insert(service.legacy_var.to_string(), value);
                }
            }
        }
        self
    }

    /// Fail-fast validation. The store must never operate without encryption
    /// parameters, so an empty passphrase or salt is fatal.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.passphrase.is_empty() {
            return Err(DomainError::Configuration(
                "Vault passphrase is not configured".to_string(),
            ));
        }
        if self.salt.is_empty() {
            return Err(DomainError::Configuration(
                "Vault salt is not configured".to_string(),
            ));
        }
        if self.salt.len() < MIN_SALT_LEN {
            return Err(DomainError::Configuration(format!(
                "Vault salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }
        if self.cache_ttl.is_zero() {
            return Err(DomainError::Configuration(
                "Cache TTL must be non-zero".to_string(),
            ));
        }
        if self.remote_timeout.is_zero() {
            return Err(DomainError::Configuration(
                "Remote timeout must be non-zero".to_string(),
            ));
        }
        if self.kdf.memory_cost == 0 || self.kdf.time_cost == 0 || self.kdf.parallelism == 0 {
            return Err(DomainError::Configuration(
                "Key derivation parameters must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> VaultConfig {
        VaultConfig::new("passphrase", "salt-salt", StoreBackend::InMemory)
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn missing_passphrase_is_configuration_error() {
        let config = VaultConfig::new("", "salt-salt", StoreBackend::InMemory);
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn missing_salt_is_configuration_error() {
        let config = VaultConfig::new("passphrase", "", StoreBackend::InMemory);
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn short_salt_is_rejected() {
        let config = VaultConfig::new("passphrase", "short", StoreBackend::InMemory);
        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration(_))
        ));
    }

    #[test]
    fn defaults_are_sensible() {
        let config = base_config();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.remote_timeout, Duration::from_secs(10));
        assert!(config.legacy_values.is_empty());
    }
}
