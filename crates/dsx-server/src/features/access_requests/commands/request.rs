//! Request access to a shared dataset
//!
//! A request may offer one of the requester's own shared datasets in
//! exchange. The offer is the requester's consent to an exchange grant: the
//! owner can then unlock both datasets at once, but only for the dataset
//! offered.

use dsx_common::types::{AccessLevel, Dataset, RequestStatus, UpsertOutcome, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::SharingEvent;
use crate::features::access_requests::resolve::{request_target, source_of};
use crate::features::shared::{require_access, verify_dataset, AuthzError, DatasetValidationError};
use crate::features::SharingState;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAccessCommand {
    pub dataset_id: Uuid,
    pub user: User,
    /// The requester's own shared dataset, offered in exchange
    #[serde(default)]
    pub exchange_dataset_id: Option<Uuid>,
}

/// Business outcome of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    AlreadyHasAccess,
    AlreadyRequested,
    NotShared,
    /// A pending entry was written on the preview
    Sent { preview_id: Uuid },
}

impl RequestOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            RequestOutcome::AlreadyHasAccess => "User already has access to this data",
            RequestOutcome::AlreadyRequested => "User has already requested access to this data",
            RequestOutcome::NotShared => "Dataset is not shared",
            RequestOutcome::Sent { .. } => "Access request sent",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestAccessError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Validation(#[from] DatasetValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<RequestOutcome, RequestAccessError>> for RequestAccessCommand {}

impl crate::cqrs::middleware::Command for RequestAccessCommand {}

/// Handles an access request
///
/// The "already requested" check runs twice: once up front so the common
/// case avoids a write, and again inside the store's atomic upsert so two
/// concurrent requests still leave one entry.
#[tracing::instrument(skip(state, command), fields(dataset_id = %command.dataset_id, user = %command.user.login))]
pub async fn handle(
    state: SharingState,
    command: RequestAccessCommand,
) -> Result<RequestOutcome, RequestAccessError> {
    let dataset = state
        .datasets
        .find_dataset(command.dataset_id)
        .await?
        .ok_or(RequestAccessError::NotFound(command.dataset_id))?;
    verify_dataset(&dataset)?;

    let Some(preview) = request_target(state.datasets.as_ref(), &dataset).await? else {
        tracing::debug!("Dataset is not shared");
        return Ok(RequestOutcome::NotShared);
    };
    let source = source_of(state.datasets.as_ref(), &preview).await?;

    let user = &command.user;
    if state
        .settings
        .self_request
        .already_has_access(user, &preview, source.as_ref())
    {
        tracing::debug!("Requesting user already has access");
        return Ok(RequestOutcome::AlreadyHasAccess);
    }

    let blocking = state.settings.rerequest.blocking_statuses();
    if preview.access.status_of(user.id).is_some_and(|s| blocking.contains(&s)) {
        tracing::debug!("Access already requested");
        return Ok(RequestOutcome::AlreadyRequested);
    }

    let offer = match command.exchange_dataset_id {
        Some(id) => Some(offered_preview(&state, id, user).await?.id),
        None => None,
    };

    let outcome = state
        .datasets
        .upsert_access_request(preview.id, user.id, RequestStatus::Pending, blocking)
        .await?;
    if let UpsertOutcome::Kept { current } = outcome {
        tracing::debug!(%current, "Access requested concurrently");
        return Ok(RequestOutcome::AlreadyRequested);
    }
    let stale_offer = preview.access.request_of(user.id).and_then(|r| r.offer);
    if offer.is_some() || stale_offer.is_some() {
        state.datasets.set_request_offer(preview.id, user.id, offer).await?;
    }

    state.notifier.notify(SharingEvent::AccessRequested {
        dataset_id: preview.id,
        requesting_user_id: user.id,
        owner_id: preview.creator_id,
    });
    tracing::info!(preview_id = %preview.id, user_id = %user.id, ?outcome, ?offer, "Access request sent");
    Ok(RequestOutcome::Sent {
        preview_id: preview.id,
    })
}

/// Resolve an offered dataset to its preview; the requester must own both
async fn offered_preview(state: &SharingState, dataset_id: Uuid, user: &User) -> Result<Dataset, RequestAccessError> {
    let dataset = state
        .datasets
        .find_dataset(dataset_id)
        .await?
        .ok_or(RequestAccessError::NotFound(dataset_id))?;
    verify_dataset(&dataset)?;
    let preview = request_target(state.datasets.as_ref(), &dataset)
        .await?
        .ok_or(DatasetValidationError::NotSharable(dataset.id))?;
    let source = source_of(state.datasets.as_ref(), &preview)
        .await?
        .ok_or(DatasetValidationError::MissingSource(preview.id))?;
    require_access(&preview, user, AccessLevel::Admin)?;
    require_access(&source, user, AccessLevel::Admin)?;
    Ok(preview)
}
