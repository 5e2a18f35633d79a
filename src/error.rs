use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A submission field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn required(field: &'static str) -> Self {
        Self::new(field, "must not be empty")
    }
}

/// Whether a storage fault is worth retrying with the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageErrorKind {
    Transient,
    Permanent,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorKind::Transient => write!(f, "transient"),
            StorageErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// A fault raised by a store. The transaction it interrupted was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} storage error: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub(crate) fn lock_poisoned(operation: &'static str) -> Self {
        Self::transient(format!("store lock poisoned during {}", operation))
    }

    pub(crate) fn conflict(identifier: &str) -> Self {
        Self::permanent(format!("request {} already exists", identifier))
    }

    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        Self::transient(format!("{}: {}", context, err))
    }

    pub(crate) fn serialization(err: serde_json::Error) -> Self {
        Self::permanent(format!("serialization failed: {}", err))
    }

    pub fn is_transient(&self) -> bool {
        self.kind == StorageErrorKind::Transient
    }
}

/// Why a submission was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a request lookup produced no view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("request {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
