use std::error::Error as StdError;

use thiserror::Error;

use crate::application::feed::FeedError;
use crate::application::gateway::{AuthError, GatewayError};
use crate::cache::QueryError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

/// Error chain flattened for a single log record.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            messages: vec![message.into()],
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Short text suitable for showing to the person at the terminal.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Auth(err) | AppError::Feed(FeedError::Auth(err)) => err.user_message(),
            AppError::Domain(err) | AppError::Feed(FeedError::Invalid(err)) => err.to_string(),
            AppError::Query(err) if err.is_not_found() => "Nothing found.".to_string(),
            AppError::Gateway(GatewayError::NotFound { .. }) | AppError::NotFound(_) => {
                "Nothing found.".to_string()
            }
            AppError::Gateway(_)
            | AppError::Query(_)
            | AppError::Feed(FeedError::Gateway(_) | FeedError::Query(_)) => {
                "The remote service could not be reached.".to_string()
            }
            AppError::Feed(FeedError::EditorClosed) => "The post editor is not open.".to_string(),
            AppError::Validation(message) => message.clone(),
            AppError::Infra(InfraError::Configuration { .. }) => {
                "Configuration is invalid.".to_string()
            }
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred.".to_string(),
        }
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_)
            | AppError::Domain(_)
            | AppError::Feed(FeedError::Invalid(_) | FeedError::EditorClosed) => 2,
            _ => 1,
        }
    }
}
