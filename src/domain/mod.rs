//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod nickname;
pub mod posts;
pub mod todos;
