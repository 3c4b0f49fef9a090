//! DSX Common Library
//!
//! Shared types, logging and error handling for the DSX workspace.
//!
//! - **Types**: dataset documents, the embedded access structure, media items
//!   and users
//! - **Error Handling**: common error and result types
//! - **Logging**: `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use dsx_common::types::{AccessList, RequestStatus};
//! use uuid::Uuid;
//!
//! let mut access = AccessList::default();
//! let user = Uuid::new_v4();
//! access.upsert_request(user, RequestStatus::Pending, &[]);
//! assert_eq!(access.status_of(user), Some(RequestStatus::Pending));
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

pub use error::{DsxError, Result};
