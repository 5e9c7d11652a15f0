use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};

/// `?page=&page_size=` as sent by clients. Both optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A validated window into a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub page: u32,
    pub page_size: u32,
}

impl Window {
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Applies defaults and clamps the page size to the configured maximum.
    pub fn window(&self, config: &PaginationConfig) -> AppResult<Window> {
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::Validation("page must be 1 or greater".into()));
        }
        let page_size = match self.page_size {
            Some(0) => {
                return Err(AppError::Validation("page_size must be 1 or greater".into()))
            }
            Some(size) => size.min(config.max_page_size),
            None => config.default_page_size,
        };
        Ok(Window { page, page_size })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wraps one window of results. A page past the end is an error, except
    /// the first page of an empty set.
    pub fn new(window: Window, count: i64, results: Vec<T>) -> AppResult<Self> {
        if results.is_empty() && window.page > 1 {
            return Err(AppError::NotFound("Invalid page".into()));
        }
        let seen = window.offset() + results.len() as i64;
        Ok(Page {
            count,
            next: (seen < count).then_some(window.page + 1),
            previous: (window.page > 1).then_some(window.page - 1),
            results,
        })
    }
}
