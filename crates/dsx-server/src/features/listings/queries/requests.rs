//! Pending requests against the caller's previews

use chrono::{DateTime, Utc};
use dsx_common::types::{AccessRequest, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ListingError, ListingParams};
use crate::features::listings::pipelines::{dataset_requests, read_page};
use crate::features::shared::Paginated;
use crate::features::SharingState;
use crate::store::Collection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDatasetRequestsQuery {
    pub user: User,
    pub params: ListingParams,
}

/// One pending request; a dataset with several appears once per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRequestRow {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub created: DateTime<Utc>,
    pub request: AccessRequest,
    #[serde(default)]
    pub requesting_user_login: Option<String>,
}

impl Request<Result<Paginated<DatasetRequestRow>, ListingError>> for ListDatasetRequestsQuery {}

impl crate::cqrs::middleware::Query for ListDatasetRequestsQuery {}

#[tracing::instrument(skip(state, query), fields(user = %query.user.login))]
pub async fn handle(
    state: SharingState,
    query: ListDatasetRequestsQuery,
) -> Result<Paginated<DatasetRequestRow>, ListingError> {
    let (page, sort) = query.params.resolve()?;
    let pipeline = dataset_requests(query.user.id, &sort, &page);

    let output = state.datasets.aggregate(Collection::Folders, &pipeline).await?;
    let (rows, total) = read_page(output)?;
    Ok(Paginated::from_items(rows, &page, total))
}
