use thiserror::Error;

use crate::domain::errors::DomainError;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Lossless, variant-for-variant: the facade may react to NotFound, but it
// must never collapse Decryption or Configuration into something weaker.
impl From<DomainError> for ApplicationError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Configuration(msg) => ApplicationError::Configuration(msg),
            DomainError::NotFound(msg) => ApplicationError::NotFound(msg),
            DomainError::Decryption(msg) => ApplicationError::Decryption(msg),
            DomainError::Timeout(msg) => ApplicationError::Timeout(msg),
            DomainError::InvalidData(msg) => ApplicationError::InvalidData(msg),
            DomainError::Internal(msg) => ApplicationError::Internal(msg),
        }
    }
}
