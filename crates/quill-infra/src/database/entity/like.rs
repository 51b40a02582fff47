//! Likes on posts or comments. Exactly one of `post_id` / `comment_id` is
//! set; unique indexes on `(user_id, post_id)` and `(user_id, comment_id)`
//! keep one like per user and target.

use sea_orm::entity::prelude::*;

use quill_core::domain::LikeTarget;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "likes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Post,
    #[sea_orm(
        belongs_to = "super::comment::Entity",
        from = "Column::CommentId",
        to = "super::comment::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Comment,
}

impl ActiveModelBehavior for ActiveModel {}

/// Column and value identifying the liked record.
pub fn target_column(target: LikeTarget) -> (Column, Uuid) {
    match target {
        LikeTarget::Post(id) => (Column::PostId, id),
        LikeTarget::Comment(id) => (Column::CommentId, id),
    }
}
