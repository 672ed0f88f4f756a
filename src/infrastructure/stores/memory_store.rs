use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::models::rotation;
use crate::domain::models::secret::{SecretSummary, SecretType, VaultDocument};
use crate::domain::repositories::secret_store::SecretStore;
use crate::infrastructure::crypto::cipher::CipherEngine;

/// 内存后端：语义与文件后端一致，但不落盘，用于测试与开发
pub struct InMemorySecretStore {
    cipher: CipherEngine,
    document: Mutex<VaultDocument>,
    get_calls: AtomicU64,
    list_calls: AtomicU64,
}

impl InMemorySecretStore {
    pub fn new(cipher: CipherEngine) -> Self {
        Self {
            cipher,
            document: Mutex::new(VaultDocument::new()),
            get_calls: AtomicU64::new(0),
            list_calls: AtomicU64::new(0),
        }
    }

    /// Number of `get_secret` calls served so far. The cache tests use this
    /// to observe store round-trips.
    pub fn get_call_count(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }

    /// Number of `list_secrets` calls served so far.
    pub fn list_call_count(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Backdate a record past its rotation due date (for tests).
    #[cfg(test)]
    pub(crate) async fn force_rotation_due(&self, id: &str) {
        let mut document = self.document.lock().await;
        if let Some(record) = document.secrets.get_mut(id) {
            record.metadata.rotation_due = chrono::Utc::now() - chrono::Duration::days(1);
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn store_secret(
        &self,
        secret_type: SecretType,
        name: &str,
        value: &str,
    ) -> Result<String, DomainError> {
        tracing::debug!("Storing secret: {} ({})", name, secret_type);
        let payload = self.cipher.encrypt(value.as_bytes())?;
        let mut document = self.document.lock().await;
        Ok(document.store(secret_type, name, payload))
    }

    async fn get_secret(&self, id: &str) -> Result<String, DomainError> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        let mut document = self.document.lock().await;
        let record = document
            .mark_used(id)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))?;

        if rotation::is_rotation_needed(&record.metadata) {
            tracing::warn!("Secret {} ({}) is past its rotation due date", id, record.name);
        }

        self.cipher.decrypt_string(&record.encrypted_data)
    }

    async fn update_secret(&self, id: &str, new_value: &str) -> Result<(), DomainError> {
        let payload = self.cipher.encrypt(new_value.as_bytes())?;
        let mut document = self.document.lock().await;
        if !document.update(id, payload) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn rotate_secret(&self, id: &str, new_value: &str) -> Result<String, DomainError> {
        let payload = self.cipher.encrypt(new_value.as_bytes())?;
        let mut document = self.document.lock().await;
        document
            .rotate(id, payload)
            .ok_or_else(|| DomainError::NotFound(id.to_string()))
    }

    async fn delete_secret(&self, id: &str) -> Result<(), DomainError> {
        let mut document = self.document.lock().await;
        if !document.remove(id) {
            return Err(DomainError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_secrets(
        &self,
        filter: Option<SecretType>,
    ) -> Result<Vec<SecretSummary>, DomainError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
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
