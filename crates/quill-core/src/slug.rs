//! Slug generation, validation and uniqueness resolution.
//!
//! Slugs identify posts, categories and tags in URLs. [`generate_slug`] is a
//! pure mapping from a title; [`resolve_unique_slug`] and
//! [`resolve_unique_slug_in`] append `-1`, `-2`, ... until the candidate is
//! free. Neither resolver is atomic: the store's unique index has the final
//! word and callers retry when it rejects a write.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::RepoError;
use crate::ports::SlugIndex;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\s-]").expect("valid slug filter regex"));

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").expect("valid separator regex"));

static SLUG_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug shape regex"));

pub const SLUG_MIN_LEN: usize = 3;
pub const SLUG_MAX_LEN: usize = 100;

/// Map a title to a URL-safe slug.
///
/// Lowercases and trims, drops anything that is not an ASCII word
/// character, whitespace or `-`, folds separator runs into a single `-` and
/// trims hyphens from both ends. Titles made only of punctuation or
/// non-ASCII letters produce an empty string.
pub fn generate_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let kept = NON_SLUG_CHARS.replace_all(lowered.trim(), "");
    let joined = SEPARATOR_RUNS.replace_all(&kept, "-");
    joined.trim_matches('-').to_string()
}

/// Check that a user-supplied slug is well formed.
pub fn validate_slug(slug: &str) -> bool {
    (SLUG_MIN_LEN..=SLUG_MAX_LEN).contains(&slug.len()) && SLUG_SHAPE.is_match(slug)
}

/// `generate_slug(source)`, or `fallback` when that comes out empty.
pub fn slug_or(source: &str, fallback: &str) -> String {
    let slug = generate_slug(source);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Endless sequence `base`, `base-1`, `base-2`, ...
#[derive(Debug, Clone)]
pub struct SlugCandidates<'a> {
    base: &'a str,
    counter: u64,
}

impl<'a> SlugCandidates<'a> {
    pub fn new(base: &'a str) -> Self {
        Self { base, counter: 0 }
    }

    pub fn next_candidate(&mut self) -> String {
        let candidate = match self.counter {
            0 => self.base.to_string(),
            n => format!("{}-{}", self.base, n),
        };
        self.counter += 1;
        candidate
    }
}

impl Iterator for SlugCandidates<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.next_candidate())
    }
}

/// Return the first candidate for `base` that `exists` reports as free.
pub fn resolve_unique_slug<F>(base: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut candidates = SlugCandidates::new(base);
    loop {
        let candidate = candidates.next_candidate();
        if !exists(&candidate) {
            return candidate;
        }
    }
}

/// Async counterpart of [`resolve_unique_slug`] backed by a [`SlugIndex`].
///
/// `exclude_id` is the record being updated; its current slug does not count
/// as a collision.
pub async fn resolve_unique_slug_in<I>(
    index: &I,
    base: &str,
    exclude_id: Option<Uuid>,
) -> Result<String, RepoError>
where
    I: SlugIndex + ?Sized,
{
    let mut candidates = SlugCandidates::new(base);
    loop {
        let candidate = candidates.next_candidate();
        if !index.slug_exists(&candidate, exclude_id).await? {
            return Ok(candidate);
        }
        tracing::trace!(slug = %candidate, "Slug taken, trying next suffix");
    }
}
