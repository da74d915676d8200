//! Post feed content rules.

use super::error::DomainError;

pub const POST_CONTENT_MAX_CHARS: usize = 2_000;

/// Post body accepted by the feed: trimmed, non-empty, bounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostContent(String);

impl PostContent {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::empty("post.content"));
        }
        if trimmed.chars().count() > POST_CONTENT_MAX_CHARS {
            return Err(DomainError::too_long(
                "post.content",
                POST_CONTENT_MAX_CHARS,
            ));
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
