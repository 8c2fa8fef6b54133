//! Error types for the company registry.

use crate::types::CompanyId;
use thiserror::Error;

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("Write failed during {operation}: {reason}")]
    WriteFailure {
        operation: &'static str,
        reason: String,
    },

    #[error("Read failed during {operation}: {reason}")]
    ReadFailure {
        operation: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Corruption detected at company {id}: {detail}")]
    Corruption { id: CompanyId, detail: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl RegistryError {
    /// Wrap an error raised while opening a store.
    pub(crate) fn unavailable(err: impl std::fmt::Display) -> Self {
        RegistryError::StoreUnavailable {
            reason: err.to_string(),
        }
    }

    /// Wrap an error raised by a mutation. Already-categorized errors pass through.
    pub(crate) fn write(operation: &'static str, err: RegistryError) -> Self {
        match err {
            RegistryError::WriteFailure { .. } | RegistryError::InvalidOperation(_) => err,
            other => RegistryError::WriteFailure {
                operation,
                reason: other.to_string(),
            },
        }
    }

    /// Wrap an error raised by a scan or point lookup.
    pub(crate) fn read(operation: &'static str, err: RegistryError) -> Self {
        match err {
            RegistryError::ReadFailure { .. } => err,
            other => RegistryError::ReadFailure {
                operation,
                reason: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Deserialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RegistryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for RegistryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RegistryError::Deserialization(e.to_string())
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
