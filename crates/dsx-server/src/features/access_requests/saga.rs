//! Grant saga
//!
//! A grant touches up to four dataset documents. Each [`GrantStep`] is one
//! atomic, idempotent store write; a [`GrantPlan`] runs them in order and
//! reports how far it got when one fails, so the caller can resume.

use dsx_common::types::{AccessLevel, Dataset, RequestStatus};
use std::fmt;
use uuid::Uuid;

use crate::store::{DatasetStore, StoreError, StoreResult};

/// One write of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStep {
    SetUserAccess {
        dataset_id: Uuid,
        user_id: Uuid,
        level: AccessLevel,
    },
    MarkRequest {
        dataset_id: Uuid,
        user_id: Uuid,
        status: RequestStatus,
    },
}

impl GrantStep {
    async fn apply(&self, store: &dyn DatasetStore) -> StoreResult<()> {
        match *self {
            GrantStep::SetUserAccess {
                dataset_id,
                user_id,
                level,
            } => store.set_user_access(dataset_id, user_id, level).await,
            GrantStep::MarkRequest {
                dataset_id,
                user_id,
                status,
            } => store
                .upsert_access_request(dataset_id, user_id, status, &[])
                .await
                .map(|_| ()),
        }
    }
}

impl fmt::Display for GrantStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantStep::SetUserAccess {
                dataset_id,
                user_id,
                level,
            } => write!(f, "grant {level} on {dataset_id} to {user_id}"),
            GrantStep::MarkRequest {
                dataset_id,
                user_id,
                status,
            } => write!(f, "mark request of {user_id} on {dataset_id} {status}"),
        }
    }
}

/// A grant stopped after `completed` of `total` steps
#[derive(Debug, thiserror::Error)]
#[error("Grant stopped after {completed} of {total} steps at '{failed_step}': {source}")]
pub struct PartialCompletion {
    pub completed: usize,
    pub total: usize,
    pub failed_step: String,
    #[source]
    pub source: StoreError,
}

/// Ordered steps of a grant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantPlan {
    steps: Vec<GrantStep>,
}

impl GrantPlan {
    /// READ on the source for the requester, then mark the request granted
    pub fn simple(preview: &Dataset, source: &Dataset, requester: Uuid) -> Self {
        let mut plan = Self::default();
        plan.read_access(source, requester);
        plan.steps.push(GrantStep::MarkRequest {
            dataset_id: preview.id,
            user_id: requester,
            status: RequestStatus::Granted,
        });
        plan
    }

    /// Mutual grant between previews A (owned by `a`) and B (owned by `b`)
    pub fn exchange(
        preview_a: &Dataset,
        source_a: &Dataset,
        a: Uuid,
        preview_b: &Dataset,
        source_b: &Dataset,
        b: Uuid,
    ) -> Self {
        let mut plan = Self::default();
        plan.read_access(source_a, b);
        plan.read_access(source_b, a);
        plan.steps.push(GrantStep::MarkRequest {
            dataset_id: preview_a.id,
            user_id: b,
            status: RequestStatus::Granted,
        });
        plan.steps.push(GrantStep::MarkRequest {
            dataset_id: preview_b.id,
            user_id: a,
            status: RequestStatus::Granted,
        });
        plan
    }

    /// Users already holding READ or better keep their level
    fn read_access(&mut self, source: &Dataset, user: Uuid) {
        if source.access.level_of(user).is_some_and(|l| l >= AccessLevel::Read) {
            return;
        }
        self.steps.push(GrantStep::SetUserAccess {
            dataset_id: source.id,
            user_id: user,
            level: AccessLevel::Read,
        });
    }

    pub fn steps(&self) -> &[GrantStep] {
        &self.steps
    }

    pub async fn run(&self, store: &dyn DatasetStore) -> Result<usize, PartialCompletion> {
        self.resume(store, 0).await
    }

    /// Run the steps from index `from` on; returns the total step count
    pub async fn resume(&self, store: &dyn DatasetStore, from: usize) -> Result<usize, PartialCompletion> {
        let total = self.steps.len();
        for (index, step) in self.steps.iter().enumerate().skip(from) {
            if let Err(source) = step.apply(store).await {
                return Err(PartialCompletion {
                    completed: index,
                    total,
                    failed_step: step.to_string(),
                    source,
                });
            }
            tracing::debug!(step = index + 1, total, %step, "Grant step applied");
        }
        Ok(total)
    }
}
