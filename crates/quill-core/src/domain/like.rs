use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum LikeTarget {
    Post(Uuid),
    Comment(Uuid),
}

/// Outcome of toggling a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
}
