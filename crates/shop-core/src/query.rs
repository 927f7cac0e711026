//! Pagination for order and payment listings.

use crate::error::{ShopError, ShopResult};
use serde::Serialize;

const MAX_LIMIT: u32 = 100;

/// 1-based page request
///
/// Only built through [`PageRequest::new`] or `Default`, so `limit` is
/// never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> ShopResult<Self> {
        if page < 1 || limit < 1 || limit > MAX_LIMIT {
            return Err(ShopError::Validation(format!(
                "page must be >= 1 and limit between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Slice `items` (already sorted) into this page
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len();
        let limit = self.limit as usize;
        let skip = (self.page as usize).saturating_sub(1).saturating_mul(limit);
        let items = items.into_iter().skip(skip).take(limit).collect();
        Page {
            items,
            total,
            page: self.page,
            limit: self.limit,
            pages: total.div_ceil(limit),
        }
    }
}

/// A page of results with pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub pages: usize,
}
