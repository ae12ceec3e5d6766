//! Error types for prefcache operations

use crate::PrefKind;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backend failure: {reason}")]
    Backend { reason: String },

    #[error("Codec failure for key {key}: {reason}")]
    Codec { key: String, reason: String },

    #[error("Stored value for {key} is {found:?}, expected {expected:?}")]
    TypeMismatch {
        key: String,
        expected: PrefKind,
        found: PrefKind,
    },

    #[error("Invalid store name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Write rejected for {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("IO error: {reason}")]
    Io { reason: String },

    #[error("Invalid store configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io {
            reason: e.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file: {reason}")]
    Io { reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Master error type for all prefcache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrefError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Key {key:?} is reserved for the version tag")]
    ReservedKey { key: String },

    #[error("Cached value for {key} is {found:?}, requested as {expected:?}")]
    TypeMismatch {
        key: String,
        expected: PrefKind,
        found: PrefKind,
    },

    #[error("Declared version {version} is invalid, versions start at 1")]
    InvalidVersion { version: i32 },

    #[error("Migration from version {from} to {to} failed: {reason}")]
    Migration { from: i32, to: i32, reason: String },
}

impl PrefError {
    /// Shorthand used by migration callbacks to report a failure.
    pub fn migration(from: i32, to: i32, reason: impl Into<String>) -> Self {
        PrefError::Migration {
            from,
            to,
            reason: reason.into(),
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for prefcache operations.
pub type PrefResult<T> = Result<T, PrefError>;

// =============================================================================
// TESTS
// =============================================================================
