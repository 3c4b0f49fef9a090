//! Grant access, either one way or as a mutual exchange
//!
//! A simple grant gives the requester READ on the preview's source. An
//! exchange additionally gives the granting owner READ on the source of the
//! requester's own preview and marks both requests granted.
//!
//! An exchange needs the requester's consent: their request on the owner's
//! preview must offer exactly the requester's preview named in the grant,
//! and must be pending. A granted request is accepted too, so an exchange
//! interrupted after its first request write can be re-invoked. Ownership
//! and consent checks all complete before the first write.

use dsx_common::types::{AccessLevel, Dataset, RequestStatus, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{ExchangePair, SharingEvent};
use crate::features::access_requests::resolve::{request_target, source_of};
use crate::features::access_requests::saga::{GrantPlan, PartialCompletion};
use crate::features::shared::{
    require_access, verify_dataset, AuthzError, DatasetValidationError,
};
use crate::features::SharingState;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantAccessCommand {
    pub dataset_id: Uuid,
    pub owner: User,
    pub requesting_user_id: Uuid,
    /// The requester's own preview, for a mutual exchange
    pub exchange_dataset_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantOutcome {
    pub preview_id: Uuid,
    pub exchange: Option<ExchangePair>,
    pub steps: usize,
}

impl GrantOutcome {
    pub fn message(&self) -> &'static str {
        if self.exchange.is_some() {
            "Access exchanged"
        } else {
            "Access granted"
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrantAccessError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Validation(#[from] DatasetValidationError),

    #[error("User {requester} has no open request offering dataset {offered} in exchange")]
    ExchangeNotOffered { requester: Uuid, offered: Uuid },

    #[error(transparent)]
    PartialCompletion(#[from] PartialCompletion),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<GrantOutcome, GrantAccessError>> for GrantAccessCommand {}

impl crate::cqrs::middleware::Command for GrantAccessCommand {}

/// Load a dataset and resolve it to its preview and the preview's source
async fn preview_and_source(
    state: &SharingState,
    dataset_id: Uuid,
) -> Result<(Dataset, Dataset), GrantAccessError> {
    let dataset = state
        .datasets
        .find_dataset(dataset_id)
        .await?
        .ok_or(GrantAccessError::NotFound(dataset_id))?;
    verify_dataset(&dataset)?;

    let preview = request_target(state.datasets.as_ref(), &dataset)
        .await?
        .ok_or(DatasetValidationError::NotSharable(dataset.id))?;
    let source = source_of(state.datasets.as_ref(), &preview)
        .await?
        .ok_or(DatasetValidationError::MissingSource(preview.id))?;
    Ok((preview, source))
}

/// The requester's entry on `preview` must be open and offer `offered`
fn require_exchange_offer(preview: &Dataset, requester: Uuid, offered: Uuid) -> Result<(), GrantAccessError> {
    match preview.access.request_of(requester) {
        Some(entry)
            if matches!(entry.status, RequestStatus::Pending | RequestStatus::Granted)
                && entry.offer == Some(offered) =>
        {
            Ok(())
        },
        entry => {
            tracing::warn!(status = ?entry.map(|e| e.status), offer = ?entry.and_then(|e| e.offer), %offered, "Exchange was not offered");
            Err(GrantAccessError::ExchangeNotOffered { requester, offered })
        },
    }
}

#[tracing::instrument(
    skip(state, command),
    fields(
        dataset_id = %command.dataset_id,
        owner = %command.owner.login,
        requesting_user_id = %command.requesting_user_id,
        exchange_dataset_id = ?command.exchange_dataset_id
    )
)]
pub async fn handle(
    state: SharingState,
    command: GrantAccessCommand,
) -> Result<GrantOutcome, GrantAccessError> {
    let owner = &command.owner;
    let requester = state
        .users
        .find_user(command.requesting_user_id)
        .await?
        .ok_or(GrantAccessError::UserNotFound(command.requesting_user_id))?;

    let (preview, source) = preview_and_source(&state, command.dataset_id).await?;
    require_access(&preview, owner, AccessLevel::Admin)?;
    require_access(&source, owner, AccessLevel::Admin)?;

    let (plan, exchange) = match command.exchange_dataset_id {
        None => (GrantPlan::simple(&preview, &source, requester.id), None),
        Some(exchange_id) => {
            let (exchange_preview, exchange_source) = preview_and_source(&state, exchange_id).await?;
            require_access(&exchange_preview, &requester, AccessLevel::Admin)?;
            require_access(&exchange_source, &requester, AccessLevel::Admin)?;
            require_exchange_offer(&preview, requester.id, exchange_preview.id)?;
            let plan = GrantPlan::exchange(
                &preview,
                &source,
                owner.id,
                &exchange_preview,
                &exchange_source,
                requester.id,
            );
            let pair = ExchangePair {
                dataset_id: exchange_preview.id,
                owner_id: requester.id,
            };
            (plan, Some(pair))
        },
    };

    let steps = plan.run(state.datasets.as_ref()).await.inspect_err(|e| {
        tracing::error!(completed = e.completed, total = e.total, failed_step = %e.failed_step, "Grant partially applied");
    })?;

    state.notifier.notify(SharingEvent::AccessGranted {
        dataset_id: preview.id,
        owner_id: owner.id,
        requesting_user_id: requester.id,
        exchange,
    });
    tracing::info!(preview_id = %preview.id, steps, exchange = exchange.is_some(), "Access granted");

    Ok(GrantOutcome {
        preview_id: preview.id,
        exchange,
        steps,
    })
}
