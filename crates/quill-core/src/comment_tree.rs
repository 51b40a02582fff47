//! Threaded comment assembly.
//!
//! Storage allows replies to replies, but threads are served two levels
//! deep: a top-level comment and every reply beneath it, however nested,
//! in creation order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Comment, CommentView};

/// Anything that can be placed in a thread.
pub trait ThreadNode {
    fn node_id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
    fn created_at(&self) -> DateTime<Utc>;
}

impl ThreadNode for Comment {
    fn node_id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl ThreadNode for CommentView {
    fn node_id(&self) -> Uuid {
        self.comment.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.comment.parent_id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.comment.created_at
    }
}

/// A top-level comment and its replies. `replies` is always present,
/// possibly empty.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread<T> {
    #[serde(flatten)]
    pub comment: T,
    pub replies: Vec<T>,
}

/// Attach replies to the page of top-level comments they descend from.
///
/// `top_level` keeps the caller's order (its sort and pagination are the
/// caller's business). Each thread's replies are sorted by `created_at`
/// ascending. Replies whose chain of parents never reaches a comment in
/// `top_level` are dropped, as are members of a parent cycle.
pub fn assemble_comment_tree<T: ThreadNode>(top_level: Vec<T>, replies: Vec<T>) -> Vec<CommentThread<T>> {
    let slots: HashMap<Uuid, usize> = top_level
        .iter()
        .enumerate()
        .map(|(slot, comment)| (comment.node_id(), slot))
        .collect();
    let parents: HashMap<Uuid, Option<Uuid>> = replies
        .iter()
        .map(|reply| (reply.node_id(), reply.parent_id()))
        .collect();

    let mut buckets: Vec<Vec<T>> = top_level.iter().map(|_| Vec::new()).collect();
    for reply in replies {
        if let Some(slot) = root_slot(reply.parent_id(), &slots, &parents) {
            buckets[slot].push(reply);
        }
    }

    top_level
        .into_iter()
        .zip(buckets)
        .map(|(comment, mut replies)| {
            replies.sort_by_key(|reply| reply.created_at());
            CommentThread { comment, replies }
        })
        .collect()
}

/// Walk up the parent chain until a top-level comment is found.
fn root_slot(
    mut parent: Option<Uuid>,
    slots: &HashMap<Uuid, usize>,
    parents: &HashMap<Uuid, Option<Uuid>>,
) -> Option<usize> {
    // A chain longer than the number of replies can only be a cycle.
    for _ in 0..=parents.len() {
        let id = parent?;
        if let Some(&slot) = slots.get(&id) {
            return Some(slot);
        }
        parent = parents.get(&id).copied().flatten();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn comment(id: u128, parent: Option<u128>, minute: i64) -> Comment {
        let base = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let at = base + Duration::minutes(minute);
        Comment {
            id: Uuid::from_u128(id),
            post_id: Uuid::from_u128(999),
            author_id: Uuid::from_u128(500),
            parent_id: parent.map(Uuid::from_u128),
            content: format!("comment {id}"),
            created_at: at,
            updated_at: at,
        }
    }

    fn ids(comments: &[Comment]) -> Vec<u128> {
        comments.iter().map(|c| c.id.as_u128()).collect()
    }

    #[test]
    fn test_direct_replies_attached_in_creation_order() {
        let top = vec![comment(1, None, 0)];
        let replies = vec![comment(3, Some(1), 5), comment(2, Some(1), 2)];

        let tree = assemble_comment_tree(top, replies);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.id, Uuid::from_u128(1));
        assert_eq!(ids(&tree[0].replies), vec![2, 3]);
    }

    #[test]
    fn test_top_level_order_preserved() {
        let top = vec![comment(2, None, 10), comment(1, None, 0)];
        let replies = vec![comment(3, Some(1), 11), comment(4, Some(2), 12)];

        let tree = assemble_comment_tree(top, replies);

        let order: Vec<u128> = tree.iter().map(|t| t.comment.id.as_u128()).collect();
        assert_eq!(order, vec![2, 1]);
        assert_eq!(ids(&tree[0].replies), vec![4]);
        assert_eq!(ids(&tree[1].replies), vec![3]);
    }

    #[test]
    fn test_no_replies_gives_empty_list() {
        let tree = assemble_comment_tree(vec![comment(1, None, 0)], Vec::new());
        assert!(tree[0].replies.is_empty());

        let json = serde_json::to_value(&tree[0]).unwrap();
        assert_eq!(json["replies"], serde_json::json!([]));
        assert_eq!(json["content"], "comment 1");
    }

    #[test]
    fn test_nested_replies_flattened_under_root() {
        let top = vec![comment(1, None, 0)];
        let replies = vec![
            comment(4, Some(3), 3),
            comment(2, Some(1), 1),
            comment(3, Some(2), 2),
        ];

        let tree = assemble_comment_tree(top, replies);

        assert_eq!(ids(&tree[0].replies), vec![2, 3, 4]);
    }

    #[test]
    fn test_replies_outside_page_are_dropped() {
        // Comment 5 is top-level but on another page; 6 replies to it.
        let top = vec![comment(1, None, 0)];
        let replies = vec![comment(6, Some(5), 1), comment(7, Some(42), 2)];

        let tree = assemble_comment_tree(top, replies);

        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let top = vec![comment(1, None, 0)];
        let replies = vec![comment(2, Some(3), 1), comment(3, Some(2), 2)];

        let tree = assemble_comment_tree(top, replies);

        assert!(tree[0].replies.is_empty());
    }
}
