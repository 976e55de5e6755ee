use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{kind} `{slug}` not found")]
    NotFound { kind: &'static str, slug: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(kind: &'static str, slug: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            slug: slug.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
