use uuid::Uuid;

use super::{Repositories, latest_published, optional_text, require_admin, require_text};
use crate::domain::{
    Actor, BIO_MAX_CHARS, DISPLAY_NAME_MAX_CHARS, Page, PageRequest, PostFilter, ProfilePatch,
    PublicProfile, SortKey, User, UserView,
};
use crate::error::DomainError;

const USER_SORT_KEYS: [SortKey; 3] = [SortKey::CreatedAt, SortKey::UpdatedAt, SortKey::Username];

/// Latest published posts served with a public profile.
const RECENT_PROFILE_POSTS: u64 = 5;

const AVATAR_MAX_CHARS: usize = 500;

/// Accounts: profiles, lookups and admin status changes.
#[derive(Clone)]
pub struct UserService {
    repos: Repositories,
}

impl UserService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// The account behind `email`, if it may sign in. Unknown and
    /// deactivated accounts both yield `Unauthorized`.
    pub async fn find_active_by_email(&self, email: &str) -> Result<User, DomainError> {
        let email = email.trim().to_lowercase();
        match self.repos.users.find_by_email(&email).await? {
            Some(user) if user.is_active => Ok(user),
            Some(user) => {
                tracing::debug!(user_id = %user.id, "Sign-in refused: account deactivated");
                Err(DomainError::Unauthorized)
            }
            None => Err(DomainError::Unauthorized),
        }
    }

    /// The account behind a token subject, if it still exists and is active.
    pub async fn find_active(&self, id: Uuid) -> Result<User, DomainError> {
        match self.repos.users.find_by_id(id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(DomainError::Unauthorized),
        }
    }

    /// The caller's own account, counting drafts.
    pub async fn profile(&self, actor: &Actor) -> Result<UserView, DomainError> {
        let user = self.find(actor.user_id).await?;
        self.view(user, false).await
    }

    pub async fn update_profile(
        &self,
        actor: &Actor,
        patch: ProfilePatch,
    ) -> Result<UserView, DomainError> {
        let mut user = self.find(actor.user_id).await?;

        if let Some(display_name) = patch.display_name {
            user.display_name = require_text("display_name", &display_name, DISPLAY_NAME_MAX_CHARS)?;
        }
        if let Some(bio) = patch.bio {
            user.bio = optional_text("bio", bio, BIO_MAX_CHARS)?;
        }
        if let Some(avatar) = patch.avatar {
            let avatar = optional_text("avatar", avatar, AVATAR_MAX_CHARS)?;
            if let Some(url) = avatar.as_deref()
                && !is_http_url(url)
            {
                return Err(DomainError::validation("avatar must be an http(s) URL"));
            }
            user.avatar = avatar;
        }
        user.updated_at = chrono::Utc::now();

        let user = self.repos.users.update(user).await?;
        tracing::info!(user_id = %user.id, "Profile updated");
        self.view(user, false).await
    }

    /// Every account, newest first unless asked otherwise. Admin-only.
    pub async fn list(
        &self,
        actor: &Actor,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<UserView>, DomainError> {
        require_admin(actor)?;
        page.ensure_sort_in(&USER_SORT_KEYS)?;
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let users = self.repos.users.list(search, &page).await?;
        let ids: Vec<Uuid> = users.items.iter().map(|u| u.id).collect();
        let stats = self.repos.users.stats(&ids, false).await?;
        Ok(users.map(|user| UserView {
            stats: stats.get(&user.id).copied().unwrap_or_default(),
            user,
        }))
    }

    /// Any account by id. Post totals count published posts only.
    pub async fn get_by_id(&self, id: Uuid) -> Result<UserView, DomainError> {
        let user = self.find(id).await?;
        self.view(user, true).await
    }

    /// The public face of an author, with their newest published posts.
    pub async fn get_by_username(&self, username: &str) -> Result<PublicProfile, DomainError> {
        let username = username.trim().to_lowercase();
        let user = self
            .repos
            .users
            .find_by_username(&username)
            .await?
            .ok_or_else(|| DomainError::not_found("User", &username))?;

        let stats = self.repos.users.stats(&[user.id], true).await?;
        let filter = PostFilter {
            author_username: Some(user.username.clone()),
            ..Default::default()
        };
        let recent_posts = latest_published(&self.repos, filter, RECENT_PROFILE_POSTS).await?;

        Ok(PublicProfile {
            stats: stats.get(&user.id).copied().unwrap_or_default(),
            id: user.id,
            username: user.username,
            display_name: user.display_name,
            avatar: user.avatar,
            bio: user.bio,
            created_at: user.created_at,
            recent_posts,
        })
    }

    /// Flip an account between active and deactivated. Admins cannot
    /// change their own status.
    pub async fn toggle_status(&self, actor: &Actor, id: Uuid) -> Result<User, DomainError> {
        require_admin(actor)?;
        if actor.user_id == id {
            return Err(DomainError::validation("cannot change the status of your own account"));
        }

        let mut user = self.find(id).await?;
        user.is_active = !user.is_active;
        user.updated_at = chrono::Utc::now();
        let user = self.repos.users.update(user).await?;

        tracing::info!(user_id = %user.id, is_active = user.is_active, "Account status changed");
        Ok(user)
    }

    async fn find(&self, id: Uuid) -> Result<User, DomainError> {
        self.repos
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    async fn view(&self, user: User, published_posts_only: bool) -> Result<UserView, DomainError> {
        let stats = self.repos.users.stats(&[user.id], published_posts_only).await?;
        Ok(UserView {
            stats: stats.get(&user.id).copied().unwrap_or_default(),
            user,
        })
    }
}

/// `http://` or `https://` followed by a host, without whitespace.
fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
