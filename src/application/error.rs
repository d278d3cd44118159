use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::repos::RepoError, cache::TagParseError, domain::error::DomainError,
    infra::error::InfraError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Tag(#[from] TagParseError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Tag(_)
            | AppError::Validation(_) => 2,
            AppError::Infra(InfraError::Database { .. }) | AppError::Repo(_) => 3,
            _ => 1,
        }
    }

    /// This error and each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = StdError::source(self);
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(AppError::validation("bad line").exit_code(), 2);
        assert_eq!(AppError::from(RepoError::Timeout).exit_code(), 3);
        assert_eq!(AppError::unexpected("boom").exit_code(), 1);
    }

    #[test]
    fn chain_includes_sources() {
        let io = std::io::Error::other("disk gone");
        let err = AppError::from(InfraError::from(io));
        let chain = err.chain();
        assert_eq!(chain[0], "io error: disk gone");
        assert_eq!(chain.last().map(String::as_str), Some("disk gone"));
    }
}
