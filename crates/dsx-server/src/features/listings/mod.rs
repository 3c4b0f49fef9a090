//! Paginated list views over sharable datasets and their requests

pub mod pipelines;
pub mod queries;
pub mod routes;

pub use queries::{
    DatasetRequestRow, ListDatasetRequestsQuery, ListRequestedDatasetsQuery,
    ListSharableDatasetsQuery, ListingError, ListingParams, RequestedDatasetRow,
    SharableDatasetRow,
};
pub use routes::listings_routes;
