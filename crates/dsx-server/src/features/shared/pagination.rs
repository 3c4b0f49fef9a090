//! Shared pagination utilities
//!
//! List views page with `limit`/`offset` and sort on one whitelisted field.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dsx_server::features::shared::pagination::{PaginationParams, SortSpec};
//!
//! let params = PaginationParams::new(Some(20), Some(40));
//! params.validate()?;
//! let sort = SortSpec::parse(Some("name"), Some("desc"))?;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::SortDirection;

/// Default page size
pub const DEFAULT_LIMIT: i64 = 50;

/// Largest accepted page size
pub const MAX_LIMIT: i64 = 1000;

/// Fields list views may sort on
pub const SORT_FIELDS: &[&str] = &["created", "updated", "name", "size"];

/// Errors in paging or sorting parameters
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Limit must be between 1 and 1000")]
    Limit,

    #[error("Offset must not be negative")]
    Offset,

    #[error("Cannot sort on '{0}'")]
    SortField(String),

    #[error("Invalid sort direction '{0}'")]
    SortDirection(String),
}

/// Page request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PaginationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self { limit, offset }
    }

    /// Page size, defaulting to 50 and clamped to 1-1000
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn validate(&self) -> Result<(), PaginationError> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_LIMIT).contains(&limit) {
                return Err(PaginationError::Limit);
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(PaginationError::Offset);
            }
        }
        Ok(())
    }
}

/// Sort field and direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: "created".to_string(),
            direction: SortDirection::Ascending,
        }
    }
}

impl SortSpec {
    /// Parse optional `sort` and `sortDir` query values
    ///
    /// Directions accept `asc`, `ascending`, `1`, `desc`, `descending` and `-1`.
    pub fn parse(field: Option<&str>, direction: Option<&str>) -> Result<Self, PaginationError> {
        let mut spec = SortSpec::default();
        if let Some(field) = field.map(str::trim).filter(|f| !f.is_empty()) {
            if !SORT_FIELDS.contains(&field) {
                return Err(PaginationError::SortField(field.to_string()));
            }
            spec.field = field.to_string();
        }
        if let Some(direction) = direction.map(str::trim).filter(|d| !d.is_empty()) {
            spec.direction = match direction.to_ascii_lowercase().as_str() {
                "asc" | "ascending" | "1" => SortDirection::Ascending,
                "desc" | "descending" | "-1" => SortDirection::Descending,
                _ => return Err(PaginationError::SortDirection(direction.to_string())),
            };
        }
        Ok(spec)
    }
}

/// Pagination metadata for responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMetadata {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMetadata {
    pub fn new(limit: i64, offset: i64, total: i64) -> Self {
        Self {
            limit,
            offset,
            total,
            has_next: offset + limit < total,
            has_prev: offset > 0,
        }
    }

    pub fn from_params(params: &PaginationParams, total: i64) -> Self {
        Self::new(params.limit(), params.offset(), total)
    }
}

/// Wrapper for paginated list responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMetadata,
}

impl<T> Paginated<T> {
    pub fn from_items(items: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        Self {
            items,
            pagination: PaginationMetadata::from_params(params, total),
        }
    }
}
