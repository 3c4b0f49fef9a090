//! Shared utilities and types for feature modules
//!
//! # Contents
//!
//! - **authz**: dataset access-level checks
//! - **identity**: acting-user resolution from request headers
//! - **media**: media enumeration and auxiliary folders
//! - **pagination**: paging and sorting parameters
//! - **validation**: structural dataset checks
//! - **test_helpers**: test fixtures (test-only)

pub mod authz;
pub mod identity;
pub mod media;
pub mod pagination;
pub mod validation;

#[cfg(test)]
pub mod test_helpers;

pub use authz::{require_access, AuthzError};
pub use pagination::{Paginated, PaginationError, PaginationMetadata, PaginationParams, SortSpec};
pub use validation::{verify_dataset, verify_sharable_dataset, DatasetValidationError};
