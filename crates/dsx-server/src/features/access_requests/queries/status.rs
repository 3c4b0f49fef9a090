//! Request status of the acting user

use dsx_common::types::{RequestStatus, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::access_requests::resolve::request_target;
use crate::features::SharingState;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestStatusQuery {
    pub dataset_id: Uuid,
    pub user: User,
}

/// `status` is `null` when the user never asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStatusResponse {
    pub id: Uuid,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestStatusError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<RequestStatusResponse, RequestStatusError>> for RequestStatusQuery {}

impl crate::cqrs::middleware::Query for RequestStatusQuery {}

#[tracing::instrument(skip(state, query), fields(dataset_id = %query.dataset_id, user = %query.user.login))]
pub async fn handle(
    state: SharingState,
    query: RequestStatusQuery,
) -> Result<RequestStatusResponse, RequestStatusError> {
    let dataset = state
        .datasets
        .find_dataset(query.dataset_id)
        .await?
        .ok_or(RequestStatusError::NotFound(query.dataset_id))?;

    let status = request_target(state.datasets.as_ref(), &dataset)
        .await?
        .and_then(|preview| preview.access.status_of(query.user.id));

    Ok(RequestStatusResponse {
        id: query.user.id,
        status,
    })
}
