//! Pending requests reached through the previews of the caller's datasets

use chrono::{DateTime, Utc};
use dsx_common::types::{AccessRequest, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ListingError, ListingParams};
use crate::features::listings::pipelines::{read_page, requested_datasets};
use crate::features::shared::Paginated;
use crate::features::SharingState;
use crate::store::Collection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRequestedDatasetsQuery {
    pub user: User,
    pub params: ListingParams,
}

/// A source dataset paired with one pending request on its preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedDatasetRow {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub created: DateTime<Utc>,
    pub preview_id: Uuid,
    pub request: AccessRequest,
    #[serde(default)]
    pub requesting_user_login: Option<String>,
}

impl Request<Result<Paginated<RequestedDatasetRow>, ListingError>> for ListRequestedDatasetsQuery {}

impl crate::cqrs::middleware::Query for ListRequestedDatasetsQuery {}

#[tracing::instrument(skip(state, query), fields(user = %query.user.login))]
pub async fn handle(
    state: SharingState,
    query: ListRequestedDatasetsQuery,
) -> Result<Paginated<RequestedDatasetRow>, ListingError> {
    let (page, sort) = query.params.resolve()?;
    let pipeline = requested_datasets(query.user.id, &sort, &page);

    let output = state.datasets.aggregate(Collection::Folders, &pipeline).await?;
    let (rows, total) = read_page(output)?;
    Ok(Paginated::from_items(rows, &page, total))
}
