//! Sharable datasets visible to a user

use chrono::{DateTime, Utc};
use dsx_common::types::{DatasetMeta, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ListingError, ListingParams};
use crate::features::listings::pipelines::{read_page, sharable_datasets};
use crate::features::shared::Paginated;
use crate::features::SharingState;
use crate::store::Collection;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSharableDatasetsQuery {
    pub user: User,
    pub params: ListingParams,
    /// Hide previews the user was already granted
    pub exclude_granted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharableDatasetRow {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creator_id: Option<Uuid>,
    #[serde(default)]
    pub owner_login: Option<String>,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub meta: DatasetMeta,
}

impl Request<Result<Paginated<SharableDatasetRow>, ListingError>> for ListSharableDatasetsQuery {}

impl crate::cqrs::middleware::Query for ListSharableDatasetsQuery {}

#[tracing::instrument(skip(state, query), fields(user = %query.user.login, exclude_granted = query.exclude_granted))]
pub async fn handle(
    state: SharingState,
    query: ListSharableDatasetsQuery,
) -> Result<Paginated<SharableDatasetRow>, ListingError> {
    let (page, sort) = query.params.resolve()?;
    let pipeline = sharable_datasets(query.user.id, query.exclude_granted, &sort, &page);

    let output = state.datasets.aggregate(Collection::Folders, &pipeline).await?;
    let (rows, total) = read_page(output)?;
    Ok(Paginated::from_items(rows, &page, total))
}
