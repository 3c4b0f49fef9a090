//! Configurable request rules

use dsx_common::types::{Dataset, RequestStatus, User};
use serde::{Deserialize, Serialize};

/// Who is considered to already have access to a preview's data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelfRequestPolicy {
    /// The creator of the preview or of its source
    #[default]
    Creator,
    /// Creators plus any site administrator
    CreatorOrAdmin,
}

impl SelfRequestPolicy {
    pub fn already_has_access(self, user: &User, preview: &Dataset, source: Option<&Dataset>) -> bool {
        let is_creator = preview.creator_id == Some(user.id)
            || source.is_some_and(|s| s.creator_id == Some(user.id));
        match self {
            SelfRequestPolicy::Creator => is_creator,
            SelfRequestPolicy::CreatorOrAdmin => is_creator || user.admin,
        }
    }
}

impl std::str::FromStr for SelfRequestPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "creator" => Ok(SelfRequestPolicy::Creator),
            "creator-or-admin" | "creator_or_admin" => Ok(SelfRequestPolicy::CreatorOrAdmin),
            other => Err(format!("invalid self-request policy: {other}")),
        }
    }
}

/// Whether a denied user may ask again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerequestPolicy {
    #[default]
    Allow,
    Block,
}

impl RerequestPolicy {
    /// Existing statuses that make a new request a no-op
    pub fn blocking_statuses(self) -> &'static [RequestStatus] {
        match self {
            RerequestPolicy::Allow => &[RequestStatus::Pending, RequestStatus::Granted],
            RerequestPolicy::Block => {
                &[RequestStatus::Pending, RequestStatus::Granted, RequestStatus::Denied]
            },
        }
    }
}

impl std::str::FromStr for RerequestPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" | "true" => Ok(RerequestPolicy::Allow),
            "block" | "false" => Ok(RerequestPolicy::Block),
            other => Err(format!("invalid re-request policy: {other}")),
        }
    }
}
