//! Pagination and sorting shared by every listing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(DomainError::validation(format!(
                "sort order must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

/// Sortable columns. Each listing accepts a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Views,
    Name,
    Username,
}

impl FromStr for SortKey {
    type Err = DomainError;

    /// Accepts both `created_at` and `createdAt` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created_at" | "createdAt" => Ok(SortKey::CreatedAt),
            "updated_at" | "updatedAt" => Ok(SortKey::UpdatedAt),
            "title" => Ok(SortKey::Title),
            "views" => Ok(SortKey::Views),
            "name" => Ok(SortKey::Name),
            "username" => Ok(SortKey::Username),
            other => Err(DomainError::validation(format!("unknown sort field '{other}'"))),
        }
    }
}

/// A validated page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
    pub sort: SortKey,
    pub order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
            sort: SortKey::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u64 = 10;
    pub const MAX_LIMIT: u64 = 100;

    pub fn new(page: u64, limit: u64, sort: SortKey, order: SortOrder) -> Result<Self, DomainError> {
        if page < 1 {
            return Err(DomainError::validation("page must be at least 1"));
        }
        if !(1..=Self::MAX_LIMIT).contains(&limit) {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        // The offset must fit the store's skip type.
        let offset_fits = (page - 1)
            .checked_mul(limit)
            .is_some_and(|offset| offset <= i64::MAX as u64 && usize::try_from(offset).is_ok());
        if !offset_fits {
            return Err(DomainError::validation(format!("page {page} is out of range")));
        }
        Ok(Self {
            page,
            limit,
            sort,
            order,
        })
    }

    /// Build from optional query parameters, falling back to the listing's
    /// default sort.
    pub fn from_params(
        page: Option<u64>,
        limit: Option<u64>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        default_sort: (SortKey, SortOrder),
    ) -> Result<Self, DomainError> {
        let sort = sort_by.map(str::parse::<SortKey>).transpose()?.unwrap_or(default_sort.0);
        let order = sort_order.map(str::parse::<SortOrder>).transpose()?.unwrap_or(default_sort.1);
        Self::new(page.unwrap_or(1), limit.unwrap_or(Self::DEFAULT_LIMIT), sort, order)
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Reject sort keys the listing does not support.
    pub fn ensure_sort_in(&self, allowed: &[SortKey]) -> Result<(), DomainError> {
        if allowed.contains(&self.sort) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "cannot sort by {:?} here",
                self.sort
            )))
        }
    }
}

/// One page of results plus the total across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.limit.max(1))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }

    /// Slice an already sorted, fully loaded collection.
    pub fn from_sorted(all: Vec<T>, request: &PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();
        Self::new(items, total, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_validation() {
        assert!(PageRequest::new(0, 10, SortKey::CreatedAt, SortOrder::Desc).is_err());
        assert!(PageRequest::new(1, 0, SortKey::CreatedAt, SortOrder::Desc).is_err());
        assert!(PageRequest::new(1, 101, SortKey::CreatedAt, SortOrder::Desc).is_err());
        assert!(PageRequest::new(3, 100, SortKey::Title, SortOrder::Asc).is_ok());
    }

    #[test]
    fn test_from_params_defaults_and_parsing() {
        let req = PageRequest::from_params(None, None, None, None, (SortKey::Name, SortOrder::Asc))
            .unwrap();
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 10);
        assert_eq!(req.sort, SortKey::Name);
        assert_eq!(req.order, SortOrder::Asc);

        let req = PageRequest::from_params(
            Some(2),
            Some(5),
            Some("createdAt"),
            Some("DESC"),
            (SortKey::Name, SortOrder::Asc),
        )
        .unwrap();
        assert_eq!(req.sort, SortKey::CreatedAt);
        assert_eq!(req.order, SortOrder::Desc);
        assert_eq!(req.offset(), 5);

        assert!(
            PageRequest::from_params(None, None, Some("bogus"), None, Default::default()).is_err()
        );
    }

    #[test]
    fn test_huge_page_numbers_are_rejected() {
        let err = PageRequest::from_params(Some(u64::MAX), Some(100), None, None, Default::default())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(PageRequest::new(u64::MAX / 2, 10, SortKey::CreatedAt, SortOrder::Desc).is_err());

        let last = PageRequest::new(1_000_000, 100, SortKey::CreatedAt, SortOrder::Desc).unwrap();
        assert_eq!(last.offset(), 99_999_900);
        assert!(Page::from_sorted(vec![1, 2, 3], &last).items.is_empty());
    }

    #[test]
    fn test_page_slicing_and_total_pages() {
        let req = PageRequest::new(2, 3, SortKey::CreatedAt, SortOrder::Desc).unwrap();
        let page = Page::from_sorted((1..=7).collect::<Vec<_>>(), &req);
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert_eq!(page.total_pages(), 3);
    }
}
