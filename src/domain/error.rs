use thiserror::Error;

use crate::domain::{entities::EntityId, types::EntityKind};

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{kind} `{id}` not found")]
    NotFound { kind: EntityKind, id: EntityId },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(kind: EntityKind, id: EntityId) -> Self {
        Self::NotFound { kind, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
