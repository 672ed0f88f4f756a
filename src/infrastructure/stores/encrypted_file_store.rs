use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::models::rotation;
use crate::domain::models::secret::{EncryptedData, SecretSummary, SecretType, VaultDocument};
use crate::domain::repositories::secret_store::SecretStore;
use crate::infrastructure::crypto::cipher::CipherEngine;
use crate::infrastructure::logging::logger;

const ENVELOPE_VERSION: u32 = 1;

/// On-disk envelope: the whole vault document encrypted as one payload.
#[derive(Debug, Serialize, Deserialize)]
struct VaultEnvelope {
    encrypted: String,
    iv: String,
    #[serde(rename = "authTag")]
    auth_tag: String,
    version: u32,
}

/// 本地加密文件后端
///
/// 单个互斥锁串行化所有保险库操作；`get_secret` 也会持锁，
/// 因为它要持久化使用计数。
pub struct EncryptedFileStore {
    vault_file: PathBuf,
    cipher: CipherEngine,
    document: Mutex<VaultDocument>,
}

impl EncryptedFileStore {
    /// 打开（或初始化）保险库文件并解密整个文档
    pub async fn open(vault_file: PathBuf, cipher: CipherEngine) -> Result<Self, DomainError> {
        let existed = fs::try_exists(&vault_file).await.unwrap_or(false);
        let document = if existed {
            Self::load_document(&vault_file, &cipher).await?
        } else {
            tracing::info!("Creating vault file: {:?}", vault_file);
            VaultDocument::new()
        };

        let store = Self {
            vault_file,
            cipher,
            document: Mutex::new(document),
        };

        if !existed {
            let document = store.document.lock().await;
            store.persist(&document).await?;
        }

        tracing::info!("Vault opened: {:?}", store.vault_file);
        Ok(store)
    }

    async fn load_document(
        vault_file: &PathBuf,
        cipher: &CipherEngine,
    ) -> Result<VaultDocument, DomainError> {
        let contents = fs::read_to_string(vault_file).await.map_err(|e| {
            logger::error(&format!("Failed to read vault file {:?}: {}", vault_file, e));
            DomainError::Internal(format!("Failed to read vault file: {e}"))
        })?;

        let envelope: VaultEnvelope = serde_json::from_str(&contents).map_err(|e| {
            logger::error(&format!("Vault envelope is not valid JSON: {}", e));
            DomainError::InvalidData(format!("Invalid vault envelope: {e}"))
        })?;

        if envelope.version != ENVELOPE_VERSION {
            return Err(DomainError::InvalidData(format!(
                "Unsupported vault version: {}",
                envelope.version
            )));
        }

        // A tampered vault must fail closed; there is no partial recovery.
        let plaintext = cipher.decrypt(&EncryptedData {
            encrypted: envelope.encrypted,
            iv: envelope.iv,
            auth_tag: envelope.auth_tag,
        })?;

        serde_json::from_slice(&plaintext).map_err(|e| {
            logger::error(&format!("Decrypted vault does not parse: {}", e));
            DomainError::InvalidData(format!("Invalid vault document: {e}"))
        })
    }

    /// Re-encrypt the document and commit it atomically (temp file + rename).
    async fn persist(&self, document: &VaultDocument) -> Result<(), DomainError> {
        let plaintext = serde_json::to_vec(document)
            .map_err(|e| DomainError::InvalidData(format!("Failed to serialize vault: {e}")))?;
        let payload = self.cipher.encrypt(&plaintext)?;

        let envelope = VaultEnvelope {
            encrypted: payload.encrypted,
            iv: payload.iv,
            auth_tag: payload.auth_tag,
            version: ENVELOPE_VERSION,
        };
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| DomainError::InvalidData(format!("Failed to serialize envelope: {e}")))?;

        if let Some(parent) = self.vault_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    DomainError::Internal(format!("Failed to create vault directory: {e}"))
                })?;
            }
        }

        let tmp = self.vault_file.with_extension("vault.tmp");
        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to create vault file: {e}")))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to write vault file: {e}")))?;
        file.sync_all()
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to sync vault file: {e}")))?;
        drop(file);

        fs::rename(&tmp, &self.vault_file)
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to commit vault file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl SecretStore for EncryptedFileStore {
    async fn store_secret(
        &self,
        secret_type: SecretType,
        name: &str,
        value: &str,
    ) -> Result<String, DomainError> {
        tracing::info!("Storing secret: {} ({})", name, secret_type);
        let payload = self.cipher.encrypt(value.as_bytes())?;

        let mut document = self.document.lock().await;
        let id = document.store(secret_type, name, payload);
        self.persist(&document).await?;
        Ok(id)
    }

    async fn get_secret(&self, id: &str) -> Result<String, DomainError> {
        let mut document = self.document.lock().await;
        let record = document
            .mark_used(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;

        if rotation::is_rotation_needed(&record.metadata) {
            tracing::warn!("Secret {} ({}) is past its rotation due date", id, record.name);
        }

        let value = self.cipher.decrypt_string(&record.encrypted_data)?;
        self.persist(&document).await?;
        Ok(value)
    }

    async fn update_secret(&self, id: &str, new_value: &str) -> Result<(), DomainError> {
        tracing::info!("Updating secret: {}", id);
        let payload = self.cipher.encrypt(new_value.as_bytes())?;

        let mut document = self.document.lock().await;
        if !document.update(id, payload) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        self.persist(&document).await
    }

    async fn rotate_secret(&self, id: &str, new_value: &str) -> Result<String, DomainError> {
        tracing::info!("Rotating secret: {}", id);
        let payload = self.cipher.encrypt(new_value.as_bytes())?;

        let mut document = self.document.lock().await;
        let new_id = document
            .rotate(id, payload)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;
        self.persist(&document).await?;
        Ok(new_id)
    }

    async fn delete_secret(&self, id: &str) -> Result<(), DomainError> {
        tracing::info!("Deleting secret: {}", id);
        let mut document = self.document.lock().await;
        if !document.remove(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        self.persist(&document).await
    }

    async fn list_secrets(
        &self,
        filter: Option<SecretType>,
    ) -> Result<Vec<SecretSummary>, DomainError> {
        let document = self.document.lock().await;
        Ok(document.summaries(filter))
    }

    async fn secrets_needing_rotation(&self) -> Result<Vec<SecretSummary>, DomainError> {
        let document = self.document.lock().await;
        Ok(document
            .summaries(None)
            .into_iter()
            .filter(|summary| summary.needs_rotation)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KdfParams, StoreBackend, VaultConfig};
    use tempfile::TempDir;

    fn test_config() -> VaultConfig {
        let mut config = VaultConfig::new("test-passphrase", "test-salt", StoreBackend::InMemory);
        config.kdf = KdfParams {
            memory_cost: 16,
            time_cost: 1,
            parallelism: 1,
        };
        config
    }

    fn test_cipher() -> CipherEngine {
        CipherEngine::derive(&test_config()).unwrap()
    }

    async fn open_store(dir: &TempDir) -> EncryptedFileStore {
        EncryptedFileStore::open(dir.path().join("secrets.vault"), test_cipher())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn store_and_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let id = store
            .store_secret(SecretType::ApiKey, "openai", "sk-test")
            .await
            .unwrap();
        assert_eq!(store.get_secret(&id).await.unwrap(), "sk-test");

        let summaries = store.list_secrets(None).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].usage_count, 1);
    }

    #[tokio::test]
    async fn vault_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.vault");

        let id = {
            let store = EncryptedFileStore::open(path.clone(), test_cipher())
                .await
                .unwrap();
            let id = store
                .store_secret(SecretType::ApiKey, "openai", "sk-test")
                .await
                .unwrap();
            store.get_secret(&id).await.unwrap();
            id
        };

        let reopened = EncryptedFileStore::open(path, test_cipher()).await.unwrap();
        assert_eq!(reopened.get_secret(&id).await.unwrap(), "sk-test");

        // Usage tracking was persisted by the first process, then bumped once more.
        let summaries = reopened.list_secrets(None).await.unwrap();
        assert_eq!(summaries[0].usage_count, 2);
    }

    #[tokio::test]
    async fn envelope_on_disk_has_expected_shape() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;
        store
            .store_secret(SecretType::ApiKey, "openai", "sk-test")
            .await
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("secrets.vault")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(json.get("encrypted").is_some());
        assert!(json.get("iv").is_some());
        assert!(json.get("authTag").is_some());
        assert_eq!(json.get("version").unwrap(), 1);
        assert!(!contents.contains("sk-test"));
    }

    #[tokio::test]
    async fn corrupted_envelope_fails_closed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.vault");
        {
            let store = EncryptedFileStore::open(path.clone(), test_cipher())
                .await
                .unwrap();
            store
                .store_secret(SecretType::ApiKey, "openai", "sk-test")
                .await
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let encrypted = json["encrypted"].as_str().unwrap().to_string();
        let mut bytes = hex::decode(encrypted).unwrap();
        bytes[0] ^= 0x01;
        json["encrypted"] = serde_json::Value::String(hex::encode(bytes));
        std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

        let result = EncryptedFileStore::open(path, test_cipher()).await;
        assert!(matches!(result, Err(DomainError::Decryption(_))));
    }

    #[tokio::test]
    async fn wrong_passphrase_cannot_open_vault() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.vault");
        {
            EncryptedFileStore::open(path.clone(), test_cipher())
                .await
                .unwrap();
        }

        let mut config = test_config();
        config.passphrase = "wrong-passphrase".to_string();
        let wrong = CipherEngine::derive(&config).unwrap();

        let result = EncryptedFileStore::open(path, wrong).await;
        assert!(matches!(result, Err(DomainError::Decryption(_))));
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let id = store
            .store_secret(SecretType::Token, "session", "tok-1")
            .await
            .unwrap();
        store.delete_secret(&id).await.unwrap();

        assert!(matches!(
            store.get_secret(&id).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_secret(&id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rotate_creates_successor_and_keeps_old_record() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let id = store
            .store_secret(SecretType::ApiKey, "openai", "old-value")
            .await
            .unwrap();
        let new_id = store.rotate_secret(&id, "new-value").await.unwrap();
        assert_ne!(id, new_id);

        assert_eq!(store.get_secret(&new_id).await.unwrap(), "new-value");

        let summaries = store.list_secrets(None).await.unwrap();
        let old = summaries.iter().find(|s| s.id == id).unwrap();
        assert_eq!(old.rotated_to.as_deref(), Some(new_id.as_str()));
        let new = summaries.iter().find(|s| s.id == new_id).unwrap();
        assert_eq!(new.rotated_from.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn update_replaces_value_in_place() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir).await;

        let id = store
            .store_secret(SecretType::Database, "postgres", "pw-1")
            .await
            .unwrap();
        store.update_secret(&id, "pw-2").await.unwrap();

        assert_eq!(store.get_secret(&id).await.unwrap(), "pw-2");
        assert_eq!(store.list_secrets(None).await.unwrap().len(), 1);
    }
}
