//! List-view queries
//!
//! All three views share paging and sorting parameters and fail the same
//! way, so they share [`ListingParams`] and [`ListingError`].

pub mod requested;
pub mod requests;
pub mod sharable;

use serde::{Deserialize, Serialize};

use crate::features::shared::{PaginationError, PaginationParams, SortSpec};
use crate::store::StoreError;

pub use requested::{ListRequestedDatasetsQuery, RequestedDatasetRow};
pub use requests::{DatasetRequestRow, ListDatasetRequestsQuery};
pub use sharable::{ListSharableDatasetsQuery, SharableDatasetRow};

/// Paging and sorting as given by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub sort_dir: Option<String>,
}

impl ListingParams {
    /// Validated page and sort
    pub fn resolve(&self) -> Result<(PaginationParams, SortSpec), ListingError> {
        let page = PaginationParams::new(self.limit, self.offset);
        page.validate()?;
        let sort = SortSpec::parse(self.sort.as_deref(), self.sort_dir.as_deref())?;
        Ok((page, sort))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
