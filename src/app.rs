use std::sync::Arc;

use crate::application::errors::ApplicationError;
use crate::application::services::token_provider::TokenProvider;
use crate::config::{StoreBackend, VaultConfig};
use crate::domain::repositories::secret_store::SecretStore;
use crate::infrastructure::crypto::cipher::CipherEngine;
use crate::infrastructure::stores::encrypted_file_store::EncryptedFileStore;
use crate::infrastructure::stores::memory_store::InMemorySecretStore;
use crate::infrastructure::stores::remote_store::RemoteSecretStore;

/// 保险库运行态：进程启动时构造一次，按引用传给各协作方
///
/// 后端只在这里选定；不存在任何模块级单例。
pub struct VaultState {
    pub store: Arc<dyn SecretStore>,
    pub token_provider: Arc<TokenProvider>,
}

impl VaultState {
    pub async fn new(config: VaultConfig) -> Result<Self, ApplicationError> {
        tracing::info!("Initializing vault state");
        config.validate()?;

        let store: Arc<dyn SecretStore> = match &config.backend {
            StoreBackend::LocalFile { vault_file } => {
                let cipher = CipherEngine::derive(&config)?;
                Arc::new(EncryptedFileStore::open(vault_file.clone(), cipher).await?)
            }
            StoreBackend::InMemory => {
                let cipher = CipherEngine::derive(&config)?;
                Arc::new(InMemorySecretStore::new(cipher))
            }
            StoreBackend::Remote { base_url } => Arc::new(RemoteSecretStore::new(
                base_url.clone(),
                config.remote_timeout,
            )?),
        };

        let token_provider = Arc::new(TokenProvider::new(store.clone(), &config));
        token_provider.initialize().await?;

        tracing::info!("Vault state initialized successfully");
        Ok(Self {
            store,
            token_provider,
        })
    }
}
