use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{render::RenderError, repos::ContentError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Flattened error chain suitable for printing to a terminal or log line.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn render(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit code for the command-line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) => 2,
            AppError::Domain(DomainError::Validation { .. }) => 64,
            AppError::Content(_) => 65,
            AppError::Infra(InfraError::Configuration { .. }) => 78,
            AppError::Infra(_) | AppError::Render(_) | AppError::Unexpected(_) => 1,
        }
    }
}
