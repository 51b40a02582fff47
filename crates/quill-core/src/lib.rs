//! # Quill Core
//!
//! The domain layer of the Quill blog.
//! Post identity (slugs), content cleanup, comment threading and the
//! services that apply them. No infrastructure dependencies: storage is
//! reached only through the traits in [`ports`].

pub mod comment_tree;
pub mod content;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod slug;

pub use comment_tree::assemble_comment_tree;
pub use content::{extract_excerpt, reading_time, sanitize};
pub use error::{DomainError, RepoError};
pub use slug::{generate_slug, resolve_unique_slug, validate_slug};
