//! In-memory store - used when no database is configured, and in tests.
//!
//! Every repository view shares one set of tables behind a single async
//! `RwLock`. Unique columns are checked while the write lock is held, so the
//! store rejects a conflicting write exactly like a unique index would.
//! Data is lost on process restart.

mod repos;


use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use quill_core::domain::{Category, Comment, LikeTarget, Post, SortOrder, Tag, User};
use quill_core::services::Repositories;

pub use repos::{
    MemoryCategoryRepository, MemoryCommentRepository, MemoryLikeRepository,
    MemoryPostRepository, MemoryTagRepository, MemoryUserRepository,
};

#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) posts: HashMap<Uuid, Post>,
    pub(crate) comments: HashMap<Uuid, Comment>,
    pub(crate) categories: HashMap<Uuid, Category>,
    pub(crate) tags: HashMap<Uuid, Tag>,
    /// post id -> tag ids, in attach order
    pub(crate) post_tags: HashMap<Uuid, Vec<Uuid>>,
    pub(crate) likes: HashSet<(Uuid, LikeTarget)>,
}

pub(crate) type SharedTables = Arc<RwLock<Tables>>;

impl Tables {
    /// Remove a post and everything hanging off it.
    pub(crate) fn remove_post(&mut self, id: Uuid) -> Option<Post> {
        let post = self.posts.remove(&id)?;
        let comment_ids: Vec<Uuid> = self
            .comments
            .values()
            .filter(|c| c.post_id == id)
            .map(|c| c.id)
            .collect();
        for comment_id in comment_ids {
            self.comments.remove(&comment_id);
            self.likes.retain(|(_, target)| *target != LikeTarget::Comment(comment_id));
        }
        self.likes.retain(|(_, target)| *target != LikeTarget::Post(id));
        self.post_tags.remove(&id);
        Some(post)
    }

    /// Remove a comment together with every reply below it.
    pub(crate) fn remove_comment_subtree(&mut self, id: Uuid) -> Option<Comment> {
        let root = self.comments.remove(&id)?;
        let mut pending = vec![id];
        while let Some(parent) = pending.pop() {
            self.likes.retain(|(_, target)| *target != LikeTarget::Comment(parent));
            let children: Vec<Uuid> = self
                .comments
                .values()
                .filter(|c| c.parent_id == Some(parent))
                .map(|c| c.id)
                .collect();
            for child in children {
                self.comments.remove(&child);
                pending.push(child);
            }
        }
        Some(root)
    }

    /// Remove a user with their posts, comments and likes.
    pub(crate) fn remove_user(&mut self, id: Uuid) -> Option<User> {
        let user = self.users.remove(&id)?;
        let post_ids: Vec<Uuid> = self
            .posts
            .values()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in post_ids {
            self.remove_post(post_id);
        }
        let comment_ids: Vec<Uuid> = self
            .comments
            .values()
            .filter(|c| c.author_id == id)
            .map(|c| c.id)
            .collect();
        for comment_id in comment_ids {
            self.remove_comment_subtree(comment_id);
        }
        self.likes.retain(|(user_id, _)| *user_id != id);
        Some(user)
    }
}

/// Owner of the shared tables. Hands out one repository view per port.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: SharedTables,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> MemoryUserRepository {
        MemoryUserRepository::new(self.tables.clone())
    }

    pub fn posts(&self) -> MemoryPostRepository {
        MemoryPostRepository::new(self.tables.clone())
    }

    pub fn comments(&self) -> MemoryCommentRepository {
        MemoryCommentRepository::new(self.tables.clone())
    }

    pub fn categories(&self) -> MemoryCategoryRepository {
        MemoryCategoryRepository::new(self.tables.clone())
    }

    pub fn tags(&self) -> MemoryTagRepository {
        MemoryTagRepository::new(self.tables.clone())
    }

    pub fn likes(&self) -> MemoryLikeRepository {
        MemoryLikeRepository::new(self.tables.clone())
    }

    /// All repositories, wired for the services.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            users: Arc::new(self.users()),
            posts: Arc::new(self.posts()),
            comments: Arc::new(self.comments()),
            categories: Arc::new(self.categories()),
            tags: Arc::new(self.tags()),
            likes: Arc::new(self.likes()),
        }
    }
}

pub(crate) fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}
