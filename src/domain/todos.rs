//! Client-only todos owned by the local todo store.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

pub const TODO_TEXT_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Todo {
    /// Build a fresh, uncompleted todo stamped with `now`.
    pub fn new(text: TodoText, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into_inner(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the text and bump `updated_at`, never moving it before `created_at`.
    pub fn rewrite(&mut self, text: TodoText, now: OffsetDateTime) {
        self.text = text.into_inner();
        self.updated_at = now.max(self.created_at);
    }
}

/// Todo text that is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoText(String);

impl TodoText {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::empty("todo.text"));
        }
        if trimmed.chars().count() > TODO_TEXT_MAX_CHARS {
            return Err(DomainError::too_long("todo.text", TODO_TEXT_MAX_CHARS));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !todo.completed,
            Filter::Completed => todo.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter `{0}` (expected all, active or completed)")]
pub struct UnknownFilter(pub String);

impl FromStr for Filter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" | "done" => Ok(Filter::Completed),
            other => Err(UnknownFilter(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn todo_text_is_trimmed() {
        let text = TodoText::parse("  buy milk \n").expect("valid text");
        assert_eq!(text.as_str(), "buy milk");
    }

    #[test]
    fn blank_todo_text_is_rejected() {
        assert_eq!(
            TodoText::parse(" \t "),
            Err(DomainError::empty("todo.text"))
        );
        assert!(TodoText::parse("").is_err());
    }

    #[test]
    fn overlong_todo_text_is_rejected() {
        let raw = "x".repeat(TODO_TEXT_MAX_CHARS + 1);
        assert_eq!(
            TodoText::parse(&raw),
            Err(DomainError::too_long("todo.text", TODO_TEXT_MAX_CHARS))
        );
    }

    #[test]
    fn rewrite_never_moves_updated_at_before_created_at() {
        let created = datetime!(2024-05-01 12:00 UTC);
        let mut todo = Todo::new(TodoText::parse("a").unwrap(), created);
        todo.rewrite(TodoText::parse("b").unwrap(), datetime!(2024-04-01 12:00 UTC));

        assert_eq!(todo.text, "b");
        assert_eq!(todo.updated_at, created);
    }

    #[test]
    fn filter_parses_case_insensitively() {
        assert_eq!("Active".parse::<Filter>(), Ok(Filter::Active));
        assert_eq!("done".parse::<Filter>(), Ok(Filter::Completed));
        assert!("later".parse::<Filter>().is_err());
    }

    #[test]
    fn filter_serializes_lowercase() {
        let json = serde_json::to_string(&Filter::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
