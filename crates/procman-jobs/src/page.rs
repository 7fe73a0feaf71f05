//! Offset/limit pagination.

use serde::{Deserialize, Serialize};

/// One page of an ordered listing.
///
/// `next` carries the offset of the following page and is present exactly
/// when `offset + limit < total`.
///
/// # Examples
///
/// ```
/// use procman_jobs::Page;
///
/// let page = Page::from_vec(vec!["a", "b", "c"], 0, 2);
/// assert_eq!(page.items, vec!["a", "b"]);
/// assert_eq!(page.next, Some(2));
///
/// let last = Page::from_vec(vec!["a", "b", "c"], 2, 2);
/// assert_eq!(last.items, vec!["c"]);
/// assert_eq!(last.next, None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page, at most `limit` of them.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total: usize,
    /// Offset of the next page, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<usize>,
}

impl<T> Page<T> {
    /// Slices an already-ordered listing.
    ///
    /// An offset past the end yields an empty page with no `next`.
    pub fn from_vec(items: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = items.len();
        let page: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
        let next = offset
            .checked_add(limit)
            .filter(|end| *end < total);
        Self {
            items: page,
            total,
            next,
        }
    }

    /// Maps every item, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            next: self.next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_past_end_is_empty() {
        let page = Page::from_vec(vec![1, 2, 3], 10, 5);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.next, None);
    }

    #[test]
    fn exact_fit_has_no_next() {
        let page = Page::from_vec(vec![1, 2, 3, 4], 2, 2);
        assert_eq!(page.items, vec![3, 4]);
        assert_eq!(page.next, None);
    }

    #[test]
    fn huge_limit_does_not_overflow() {
        let page = Page::from_vec(vec![1, 2], 1, usize::MAX);
        assert_eq!(page.items, vec![2]);
        assert_eq!(page.next, None);
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::from_vec(vec![1, 2, 3], 0, 1).map(|n| n * 10);
        assert_eq!(page.items, vec![10]);
        assert_eq!(page.total, 3);
        assert_eq!(page.next, Some(1));
    }
}
