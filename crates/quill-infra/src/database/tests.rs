use std::collections::BTreeMap;

use chrono::Utc;
use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
use uuid::Uuid;

use quill_core::domain::{PageRequest, Role, SortKey, SortOrder};
use quill_core::error::RepoError;
use quill_core::ports::{
    BaseRepository, CategoryRepository, CommentRepository, PostRepository, SlugIndex,
    UserRepository,
};

use super::entity::{comment, post, user};
use super::postgres_repo::{
    PostgresCategoryRepository, PostgresCommentRepository, PostgresPostRepository,
    PostgresUserRepository,
};

fn post_model(slug: &str, views: i64) -> post::Model {
    let now = Utc::now();
    post::Model {
        id: Uuid::new_v4(),
        author_id: Uuid::new_v4(),
        category_id: None,
        title: "Test Post".to_owned(),
        slug: slug.to_owned(),
        content: "Content".to_owned(),
        excerpt: "Content".to_owned(),
        cover_image: None,
        published: true,
        featured: false,
        views,
        created_at: now.into(),
        updated_at: now.into(),
    }
}

fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
    BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
}

#[tokio::test]
async fn test_find_post_by_slug() {
    let model = post_model("test-post", 7);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![model.clone()]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    let found = repo.find_by_slug("test-post").await.unwrap().unwrap();

    assert_eq!(found.id, model.id);
    assert_eq!(found.slug, "test-post");
    assert_eq!(found.views, 7);
}

#[tokio::test]
async fn test_slug_exists_counts_matches() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![count_row(1)]])
        .append_query_results([vec![count_row(0)]])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    assert!(repo.slug_exists("taken", None).await.unwrap());
    assert!(!repo.slug_exists("taken", Some(Uuid::new_v4())).await.unwrap());
}

#[tokio::test]
async fn test_delete_missing_post_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }])
        .into_connection();

    let repo = PostgresPostRepository::new(db);
    assert!(matches!(
        repo.delete(Uuid::new_v4()).await,
        Err(RepoError::NotFound)
    ));
}

#[tokio::test]
async fn test_list_top_level_comments_paginates() {
    let now = Utc::now();
    let post_id = Uuid::new_v4();
    let model = comment::Model {
        id: Uuid::new_v4(),
        post_id,
        author_id: Uuid::new_v4(),
        parent_id: None,
        content: "First!".to_owned(),
        created_at: now.into(),
        updated_at: now.into(),
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![count_row(11)]])
        .append_query_results([vec![model.clone()]])
        .into_connection();

    let repo = PostgresCommentRepository::new(db);
    let request = PageRequest::new(2, 10, SortKey::CreatedAt, SortOrder::Desc).unwrap();
    let page = repo.list_top_level(post_id, &request).await.unwrap();

    assert_eq!(page.total, 11);
    assert_eq!(page.page, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].content, "First!");
    assert!(page.items[0].is_top_level());
}

#[tokio::test]
async fn test_count_published_posts_in_category() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![count_row(3)]])
        .into_connection();

    let repo = PostgresCategoryRepository::new(db);
    assert_eq!(repo.count_posts(Uuid::new_v4(), true).await.unwrap(), 3);
}

#[tokio::test]
async fn test_user_role_round_trips_through_model() {
    let now = Utc::now();
    let model = user::Model {
        id: Uuid::new_v4(),
        email: "ada@example.com".to_owned(),
        username: "ada".to_owned(),
        display_name: "Ada".to_owned(),
        password_hash: "hash".to_owned(),
        bio: None,
        avatar: None,
        role: "admin".to_owned(),
        is_active: true,
        created_at: now.into(),
        updated_at: now.into(),
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![model.clone()]])
        .into_connection();

    let repo = PostgresUserRepository::new(db);
    let found = repo.find_by_username("ada").await.unwrap().unwrap();
    assert_eq!(found.role, Role::Admin);
    assert_eq!(found.email, "ada@example.com");
}

#[tokio::test]
async fn test_unknown_role_is_a_query_error() {
    let now = Utc::now();
    let model = user::Model {
        id: Uuid::new_v4(),
        email: "eve@example.com".to_owned(),
        username: "eve".to_owned(),
        display_name: "Eve".to_owned(),
        password_hash: "hash".to_owned(),
        bio: None,
        avatar: None,
        role: "superuser".to_owned(),
        is_active: true,
        created_at: now.into(),
        updated_at: now.into(),
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![model]])
        .into_connection();

    let repo = PostgresUserRepository::new(db);
    assert!(matches!(
        repo.find_by_email("eve@example.com").await,
        Err(RepoError::Query(_))
    ));
}

#[tokio::test]
async fn test_list_users_keeps_deactivated_accounts() {
    let now = Utc::now();
    let model = user::Model {
        id: Uuid::new_v4(),
        email: "mallory@example.com".to_owned(),
        username: "mallory".to_owned(),
        display_name: "Mallory".to_owned(),
        password_hash: "hash".to_owned(),
        bio: None,
        avatar: None,
        role: "user".to_owned(),
        is_active: false,
        created_at: now.into(),
        updated_at: now.into(),
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![count_row(21)]])
        .append_query_results([vec![model.clone()]])
        .into_connection();

    let repo = PostgresUserRepository::new(db);
    let request = PageRequest::new(3, 10, SortKey::Username, SortOrder::Asc).unwrap();
    let page = repo.list(Some("mall"), &request).await.unwrap();

    assert_eq!(page.total, 21);
    assert_eq!(page.page, 3);
    assert_eq!(page.items.len(), 1);
    assert!(!page.items[0].is_active);
}

#[tokio::test]
async fn test_user_stats_skip_query_for_no_ids() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let repo = PostgresUserRepository::new(db);
    assert!(repo.stats(&[], true).await.unwrap().is_empty());

    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let repo = PostgresCategoryRepository::new(db);
    assert!(repo.count_posts_many(&[], true).await.unwrap().is_empty());
}
