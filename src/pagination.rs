//! 1-based `startIndex` / `count` pagination (RFC 7644 Section 3.4.2.4).
//!
//! Callers must sort the full candidate set by internal ID before filtering
//! and slicing, otherwise consecutive pages can skip or repeat resources.

use std::collections::HashMap;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    /// 1-based index of the first resource.
    pub start_index: usize,
    /// `None` returns every remaining resource.
    pub count: Option<usize>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            start_index: 1,
            count: None,
        }
    }
}

impl PaginationParams {
    pub fn new(start_index: usize, count: Option<usize>) -> Self {
        Self { start_index, count }
    }

    pub fn from_query(params: &HashMap<String, String>) -> AppResult<Self> {
        let mut pagination = PaginationParams::default();

        if let Some(raw) = params.get("startIndex") {
            let start_index: i64 = raw.trim().parse().map_err(|_| {
                AppError::bad_request(format!("Invalid startIndex: {}", raw))
            })?;
            if start_index < 1 {
                return Err(AppError::bad_request(format!(
                    "startIndex must be 1 or greater: {}",
                    start_index
                )));
            }
            pagination.start_index = start_index as usize;
        }

        if let Some(raw) = params.get("count") {
            let count: i64 = raw
                .trim()
                .parse()
                .map_err(|_| AppError::bad_request(format!("Invalid count: {}", raw)))?;
            if count < 0 {
                return Err(AppError::bad_request(format!(
                    "count must be 0 or greater: {}",
                    count
                )));
            }
            pagination.count = Some(count as usize);
        }

        Ok(pagination)
    }
}

/// Returns the requested page and the startIndex to echo back.
pub fn paginate<T>(items: Vec<T>, params: &PaginationParams) -> (Vec<T>, usize) {
    let start_index = params.start_index.max(1);
    if start_index > items.len() {
        return (Vec::new(), start_index);
    }

    let page = items
        .into_iter()
        .skip(start_index - 1)
        .take(params.count.unwrap_or(usize::MAX))
        .collect();
    (page, start_index)
}
