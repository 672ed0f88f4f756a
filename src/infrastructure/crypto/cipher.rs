//! AES-256-GCM cipher engine with Argon2id passphrase key derivation.
//!
//! Every encrypt call draws a fresh random IV; the authentication tag is kept
//! as its own envelope field. All three payload fields are hex-encoded.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::domain::errors::DomainError;
use crate::domain::models::secret::EncryptedData;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// 12-byte IV for AES-GCM (96 bits is the standard).
pub const IV_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Symmetric cipher over a passphrase-derived key (zeroized on drop).
pub struct CipherEngine {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl CipherEngine {
    /// Derive the vault key from the configured passphrase and salt.
    ///
    /// Expensive on purpose (memory-hard KDF); called once per process.
    pub fn derive(config: &VaultConfig) -> Result<Self, DomainError> {
        if config.passphrase.is_empty() {
            return Err(DomainError::Configuration(
                "Vault passphrase is not configured".to_string(),
            ));
        }
        if config.salt.is_empty() {
            return Err(DomainError::Configuration(
                "Vault salt is not configured".to_string(),
            ));
        }

        let params = Params::new(
            config.kdf.memory_cost,
            config.kdf.time_cost,
            config.kdf.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| DomainError::Configuration(format!("Invalid Argon2 params: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        argon2
            .hash_password_into(
                config.passphrase.as_bytes(),
                config.salt.as_bytes(),
                key.as_mut(),
            )
            .map_err(|e| DomainError::Configuration(format!("Key derivation failed: {e}")))?;

        Ok(Self { key })
    }

    /// Encrypt a payload with a fresh random IV.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData, DomainError> {
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| DomainError::Internal(format!("Invalid key: {e}")))?;

        let mut iv = [0u8; IV_SIZE];
        rand::rng().fill_bytes(&mut iv);
        let nonce = Nonce::from_slice(&iv);

        // The aead crate appends the tag to the ciphertext; the envelope
        // stores it as a separate field.
        let mut combined = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| DomainError::Internal("Encryption failed".to_string()))?;
        let auth_tag = combined.split_off(combined.len() - TAG_SIZE);

        Ok(EncryptedData {
            encrypted: hex::encode(&combined),
            iv: hex::encode(iv),
            auth_tag: hex::encode(auth_tag),
        })
    }

    /// Decrypt a payload, verifying the authentication tag.
    pub fn decrypt(&self, data: &EncryptedData) -> Result<Zeroizing<Vec<u8>>, DomainError> {
        let ciphertext = hex::decode(&data.encrypted)
            .map_err(|_| DomainError::Decryption("Malformed ciphertext encoding".to_string()))?;
        let iv = hex::decode(&data.iv)
            .map_err(|_| DomainError::Decryption("Malformed IV encoding".to_string()))?;
        let auth_tag = hex::decode(&data.auth_tag)
            .map_err(|_| DomainError::Decryption("Malformed tag encoding".to_string()))?;

        if iv.len() != IV_SIZE {
            return Err(DomainError::Decryption(format!(
                "Invalid IV size: expected {IV_SIZE}, got {}",
                iv.len()
            )));
        }
        if auth_tag.len() != TAG_SIZE {
            return Err(DomainError::Decryption(format!(
                "Invalid tag size: expected {TAG_SIZE}, got {}",
                auth_tag.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|e| DomainError::Internal(format!("Invalid key: {e}")))?;

        let mut combined = ciphertext;
        combined.extend_from_slice(&auth_tag);
        let nonce = Nonce::from_slice(&iv);

        cipher
            .decrypt(nonce, combined.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| DomainError::Decryption("Authentication tag mismatch".to_string()))
    }

    /// Decrypt a payload that is expected to be UTF-8 text.
    pub fn decrypt_string(&self, data: &EncryptedData) -> Result<String, DomainError> {
        let plaintext = self.decrypt(data)?;
        String::from_utf8(plaintext.to_vec())
            .map_err(|_| DomainError::Decryption("Plaintext is not valid UTF-8".to_string()))
    }
}
