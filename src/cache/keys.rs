//! Cache key definitions.
//!
//! A `CacheKey` is the composite (entity kind, optional id) addressing one slot.

use std::fmt;

use uuid::Uuid;

use crate::domain::entities::TodoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    TodoList,
    TodoDetail,
    PostList,
    Profile,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::TodoList => "todo-list",
            EntityKind::TodoDetail => "todo-detail",
            EntityKind::PostList => "post-list",
            EntityKind::Profile => "profile",
        }
    }
}

/// Id half of a composite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Int(i64),
    Uuid(Uuid),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{id}"),
            EntityId::Uuid(id) => write!(f, "{id}"),
        }
    }
}

/// Query cache key. Equal kind and equal id address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    TodoList,
    TodoDetail(TodoId),
    PostList,
    Profile(Uuid),
}

impl CacheKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            CacheKey::TodoList => EntityKind::TodoList,
            CacheKey::TodoDetail(_) => EntityKind::TodoDetail,
            CacheKey::PostList => EntityKind::PostList,
            CacheKey::Profile(_) => EntityKind::Profile,
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        match self {
            CacheKey::TodoList | CacheKey::PostList => None,
            CacheKey::TodoDetail(id) => Some(EntityId::Int(*id)),
            CacheKey::Profile(id) => Some(EntityId::Uuid(*id)),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}:{id}", self.kind().as_str()),
            None => f.write_str(self.kind().as_str()),
        }
    }
}
