use std::io;
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for bucket-fs operations
#[derive(Error, Debug)]
pub enum BucketFsError {
    #[error("Not found: [{bucket}]:{path}")]
    NotFound { bucket: String, path: String },

    #[error("Access forbidden: {0}")]
    AccessForbidden(String),

    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("No driver attached or resolvable for {0}")]
    DriverUnresolved(String),

    #[error("Cannot copy {from} into {to}: target lies inside the source")]
    TargetInsideSource { from: String, to: String },

    #[error("Cannot create directory: {0}")]
    CannotCreate(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BucketFsError {
    pub fn not_found(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        BucketFsError::NotFound {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BucketFsError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            BucketFsError::NotFound { .. } => true,
            BucketFsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Result type alias for bucket-fs operations
pub type Result<T> = std::result::Result<T, BucketFsError>;
