//! Paged response container

use serde::{Deserialize, Serialize};

/// A page of results with total counts
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_count: u64,
    pub page_number: u64,
    pub pages_available: u64,
    pub page_items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total_count: u64, page_number: u64, page_size: u64, page_items: Vec<T>) -> Self {
        let pages_available = if page_size == 0 {
            0
        } else {
            total_count.div_ceil(page_size)
        };
        Self {
            total_count,
            page_number,
            pages_available,
            page_items,
        }
    }

    pub fn empty() -> Self {
        Self {
            total_count: 0,
            page_number: 1,
            pages_available: 0,
            page_items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_available_rounds_up() {
        let page: Page<i32> = Page::new(25, 1, 10, vec![]);
        assert_eq!(page.pages_available, 3);

        let exact: Page<i32> = Page::new(30, 1, 10, vec![]);
        assert_eq!(exact.pages_available, 3);

        let none: Page<i32> = Page::new(0, 1, 10, vec![]);
        assert_eq!(none.pages_available, 0);
    }
}
