//! Sharable previews
//!
//! Deriving, replacing and removing the public preview of a dataset, and
//! listing a preview's media.

pub mod commands;
pub mod preview;
pub mod queries;
pub mod routes;

pub use commands::{ShareDatasetCommand, ShareDatasetError, ShareOutcome};
pub use preview::{preview_count, select_preview_indices};
pub use queries::{PreviewMediaError, PreviewMediaQuery, PreviewMediaResponse};
pub use routes::sharing_routes;
