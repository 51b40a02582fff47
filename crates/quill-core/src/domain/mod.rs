//! Domain entities - the core business objects.

mod category;
mod comment;
mod like;
mod page;
mod post;
mod tag;
mod user;

pub use category::{
    CATEGORY_DESCRIPTION_MAX_CHARS, CATEGORY_NAME_MAX_CHARS, Category, CategoryDetail,
    CategoryPatch, CategoryView, NewCategory, RECENT_CATEGORY_POSTS, is_hex_color,
};
pub use comment::{COMMENT_MAX_CHARS, Comment, CommentView, NewComment};
pub use like::{LikeState, LikeTarget};
pub use page::{Page, PageRequest, SortKey, SortOrder};
pub use post::{
    EXCERPT_MAX_CHARS, NewPost, Post, PostFilter, PostPatch, PostStats, PostView, TITLE_MAX_CHARS,
};
pub use tag::Tag;
pub use user::{
    Actor, AuthorSummary, BIO_MAX_CHARS, DISPLAY_NAME_MAX_CHARS, ProfilePatch, PublicProfile,
    Role, User, UserStats, UserView,
};
