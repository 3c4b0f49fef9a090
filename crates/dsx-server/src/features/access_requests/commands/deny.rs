//! Deny a pending access request

use dsx_common::types::{AccessLevel, RequestStatus, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::SharingEvent;
use crate::features::access_requests::resolve::request_target;
use crate::features::shared::{require_access, verify_dataset, AuthzError, DatasetValidationError};
use crate::features::SharingState;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenyAccessCommand {
    pub dataset_id: Uuid,
    pub owner: User,
    pub requesting_user_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyOutcome {
    pub preview_id: Uuid,
}

impl DenyOutcome {
    pub fn message(&self) -> &'static str {
        "Access denied"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DenyAccessError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Validation(#[from] DatasetValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<DenyOutcome, DenyAccessError>> for DenyAccessCommand {}

impl crate::cqrs::middleware::Command for DenyAccessCommand {}

#[tracing::instrument(
    skip(state, command),
    fields(dataset_id = %command.dataset_id, owner = %command.owner.login, requesting_user_id = %command.requesting_user_id)
)]
pub async fn handle(state: SharingState, command: DenyAccessCommand) -> Result<DenyOutcome, DenyAccessError> {
    let requester = state
        .users
        .find_user(command.requesting_user_id)
        .await?
        .ok_or(DenyAccessError::UserNotFound(command.requesting_user_id))?;
    let dataset = state
        .datasets
        .find_dataset(command.dataset_id)
        .await?
        .ok_or(DenyAccessError::NotFound(command.dataset_id))?;
    verify_dataset(&dataset)?;

    let preview = request_target(state.datasets.as_ref(), &dataset)
        .await?
        .ok_or(DatasetValidationError::NotSharable(dataset.id))?;
    require_access(&preview, &command.owner, AccessLevel::Admin)?;

    let outcome = state
        .datasets
        .upsert_access_request(preview.id, requester.id, RequestStatus::Denied, &[])
        .await?;

    state.notifier.notify(SharingEvent::AccessDenied {
        dataset_id: preview.id,
        owner_id: command.owner.id,
        requesting_user_id: requester.id,
    });
    tracing::info!(preview_id = %preview.id, ?outcome, "Access denied");
    Ok(DenyOutcome {
        preview_id: preview.id,
    })
}
