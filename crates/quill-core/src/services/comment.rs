use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::{Repositories, distinct, require_text};
use crate::comment_tree::{CommentThread, assemble_comment_tree};
use crate::domain::{
    Actor, AuthorSummary, COMMENT_MAX_CHARS, Comment, CommentView, LikeState, LikeTarget,
    NewComment, Page, PageRequest, Post, SortKey,
};
use crate::error::DomainError;

const COMMENT_SORT_KEYS: [SortKey; 2] = [SortKey::CreatedAt, SortKey::UpdatedAt];

/// Threaded comments on published posts.
#[derive(Clone)]
pub struct CommentService {
    repos: Repositories,
}

impl CommentService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Comment on a published post, optionally replying to a comment on
    /// the same post.
    pub async fn create(&self, actor: &Actor, input: NewComment) -> Result<CommentView, DomainError> {
        let content = require_text("content", &input.content, COMMENT_MAX_CHARS)?;
        self.published_post(input.post_id).await?;

        if let Some(parent_id) = input.parent_id {
            match self.repos.comments.find_by_id(parent_id).await? {
                Some(parent) if parent.post_id == input.post_id => {}
                _ => return Err(DomainError::not_found("Parent comment", parent_id)),
            }
        }

        let comment = Comment::new(input.post_id, actor.user_id, input.parent_id, content);
        let comment = self.repos.comments.insert(comment).await?;
        tracing::info!(
            comment_id = %comment.id,
            post_id = %comment.post_id,
            reply = comment.parent_id.is_some(),
            "Comment created"
        );
        self.view(comment).await
    }

    /// A page of top-level comments for a published post, each carrying all
    /// of its replies.
    pub async fn list_for_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<CommentThread<CommentView>>, DomainError> {
        page.ensure_sort_in(&COMMENT_SORT_KEYS)?;
        self.published_post(post_id).await?;

        let top_level = self.repos.comments.list_top_level(post_id, &page).await?;
        let replies = self.repos.comments.list_replies(post_id).await?;

        let Page {
            items,
            total,
            page,
            limit,
        } = top_level;
        let split = items.len();
        let mut views = self.hydrate(items.into_iter().chain(replies).collect()).await?;
        let reply_views = views.split_off(split);

        Ok(Page {
            items: assemble_comment_tree(views, reply_views),
            total,
            page,
            limit,
        })
    }

    /// Edit a comment's text. Only the author or an admin may edit.
    pub async fn update(&self, actor: &Actor, id: Uuid, content: &str) -> Result<CommentView, DomainError> {
        let mut comment = self.find(id).await?;
        if !actor.can_modify(comment.author_id) {
            return Err(DomainError::Forbidden);
        }
        comment.content = require_text("content", content, COMMENT_MAX_CHARS)?;
        comment.updated_at = Utc::now();

        let comment = self.repos.comments.update(comment).await?;
        tracing::debug!(comment_id = %comment.id, "Comment updated");
        self.view(comment).await
    }

    /// Delete a comment and its replies. Only the author or an admin may delete.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), DomainError> {
        let comment = self.find(id).await?;
        if !actor.can_modify(comment.author_id) {
            return Err(DomainError::Forbidden);
        }
        self.repos.comments.delete(id).await?;
        tracing::info!(comment_id = %id, "Comment deleted");
        Ok(())
    }

    pub async fn toggle_like(&self, actor: &Actor, id: Uuid) -> Result<LikeState, DomainError> {
        self.find(id).await?;
        Ok(self
            .repos
            .likes
            .toggle(actor.user_id, LikeTarget::Comment(id))
            .await?)
    }

    async fn find(&self, id: Uuid) -> Result<Comment, DomainError> {
        self.repos
            .comments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Comment", id))
    }

    async fn published_post(&self, post_id: Uuid) -> Result<Post, DomainError> {
        match self.repos.posts.find_by_id(post_id).await? {
            Some(post) if post.published => Ok(post),
            _ => Err(DomainError::not_found("Post", post_id)),
        }
    }

    async fn view(&self, comment: Comment) -> Result<CommentView, DomainError> {
        let mut views = self.hydrate(vec![comment]).await?;
        views
            .pop()
            .ok_or_else(|| DomainError::Internal("comment vanished while loading".to_string()))
    }

    /// Attach authors and like counts, preserving input order.
    async fn hydrate(&self, comments: Vec<Comment>) -> Result<Vec<CommentView>, DomainError> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
        let author_ids = distinct(comments.iter().map(|c| c.author_id));

        let authors: HashMap<Uuid, AuthorSummary> = self
            .repos
            .users
            .find_authors(&author_ids)
            .await?
            .into_iter()
            .map(|author| (author.id, author))
            .collect();
        let likes = self.repos.likes.count_for_comments(&ids).await?;

        Ok(comments
            .into_iter()
            .map(|comment| CommentView {
                author: authors.get(&comment.author_id).cloned(),
                like_count: likes.get(&comment.id).copied().unwrap_or(0),
                comment,
            })
            .collect())
    }
}
