//! Dataset access checks

use dsx_common::types::{AccessLevel, Dataset, User};
use thiserror::Error;
use uuid::Uuid;

/// The user lacks the required level on a dataset
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("User {user_id} lacks {required} access on dataset {dataset_id}")]
pub struct AuthzError {
    pub dataset_id: Uuid,
    pub user_id: Uuid,
    pub required: AccessLevel,
}

/// Strongest level `user` holds on `dataset`
///
/// Site administrators hold ADMIN everywhere and public datasets grant READ
/// to everyone.
pub fn effective_level(dataset: &Dataset, user: &User) -> Option<AccessLevel> {
    if user.admin {
        return Some(AccessLevel::Admin);
    }
    let granted = dataset.access.level_of(user.id);
    if dataset.public {
        return granted.max(Some(AccessLevel::Read));
    }
    granted
}

pub fn has_access(dataset: &Dataset, user: &User, level: AccessLevel) -> bool {
    effective_level(dataset, user).is_some_and(|held| held >= level)
}

pub fn require_access(dataset: &Dataset, user: &User, level: AccessLevel) -> Result<(), AuthzError> {
    if has_access(dataset, user, level) {
        Ok(())
    } else {
        Err(AuthzError {
            dataset_id: dataset.id,
            user_id: user.id,
            required: level,
        })
    }
}
