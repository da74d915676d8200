use thiserror::Error;

use crate::application::gateway::GatewayError;

/// Failure of a cache-backed read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("load for `{key}` was aborted before it produced a value")]
    Aborted { key: String },
    #[error("cache entry `{key}` holds {found}, expected {expected}")]
    UnexpectedValue {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl QueryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueryError::Gateway(err) if err.is_not_found())
    }
}
