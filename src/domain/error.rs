use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },
    #[error("`{field}` exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
}

impl DomainError {
    pub fn empty(field: &'static str) -> Self {
        Self::Empty { field }
    }

    pub fn too_long(field: &'static str, max: usize) -> Self {
        Self::TooLong { field, max }
    }
}
