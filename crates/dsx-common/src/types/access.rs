//! Access-control structure embedded in every dataset document
//!
//! A dataset carries two ordered lists under `access`: the per-user ACL
//! (`users`) and the access requests made against it (`requests`). Both are
//! keyed by user id and hold at most one entry per user.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Granted,
    Denied,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Granted => "granted",
            RequestStatus::Denied => "denied",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = crate::DsxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "granted" => Ok(RequestStatus::Granted),
            "denied" => Ok(RequestStatus::Denied),
            other => Err(crate::DsxError::Parse(format!("unknown request status: {other}"))),
        }
    }
}

/// Permission level on a dataset, ordered from weakest to strongest
///
/// Serialized as the integers 0, 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    pub fn as_i32(self) -> i32 {
        match self {
            AccessLevel::Read => 0,
            AccessLevel::Write => 1,
            AccessLevel::Admin => 2,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(AccessLevel::Read),
            1 => Some(AccessLevel::Write),
            2 => Some(AccessLevel::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Read => write!(f, "read"),
            AccessLevel::Write => write!(f, "write"),
            AccessLevel::Admin => write!(f, "admin"),
        }
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i32::deserialize(deserializer)?;
        AccessLevel::from_i32(value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid access level: {value}")))
    }
}

/// One access request entry, keyed by the requesting user's id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: Uuid,
    pub status: RequestStatus,
    /// Preview of the requester's own dataset, offered in exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<Uuid>,
}

/// One ACL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccess {
    pub id: Uuid,
    pub level: AccessLevel,
}

/// Result of writing an access request entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No entry existed for the user; one was appended
    Inserted,
    /// An entry existed and its status was overwritten
    Updated { previous: RequestStatus },
    /// An entry existed with a status the caller asked to keep; nothing changed
    Kept { current: RequestStatus },
}

impl UpsertOutcome {
    pub fn applied(self) -> bool {
        !matches!(self, UpsertOutcome::Kept { .. })
    }
}

/// The `access` structure of a dataset document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessList {
    #[serde(default)]
    pub users: Vec<UserAccess>,
    #[serde(default)]
    pub requests: Vec<AccessRequest>,
}

impl AccessList {
    /// Request entry of `user`, if any
    pub fn request_of(&self, user: Uuid) -> Option<&AccessRequest> {
        self.requests.iter().find(|r| r.id == user)
    }

    /// Current request status of `user`, if any
    pub fn status_of(&self, user: Uuid) -> Option<RequestStatus> {
        self.request_of(user).map(|r| r.status)
    }

    /// Replace the exchange offer on the entry of `user`.
    ///
    /// Returns `false` when `user` has no entry. The status is not touched.
    pub fn set_offer(&mut self, user: Uuid, offer: Option<Uuid>) -> bool {
        match self.requests.iter_mut().find(|r| r.id == user) {
            Some(entry) => {
                entry.offer = offer;
                true
            },
            None => false,
        }
    }

    /// Write `status` for `user`, updating the existing entry in place.
    ///
    /// When an entry exists and its status is contained in `keep_if`, the
    /// list is left untouched and [`UpsertOutcome::Kept`] is returned.
    pub fn upsert_request(
        &mut self,
        user: Uuid,
        status: RequestStatus,
        keep_if: &[RequestStatus],
    ) -> UpsertOutcome {
        match self.requests.iter_mut().find(|r| r.id == user) {
            Some(entry) if keep_if.contains(&entry.status) => {
                UpsertOutcome::Kept { current: entry.status }
            },
            Some(entry) => {
                let previous = entry.status;
                entry.status = status;
                UpsertOutcome::Updated { previous }
            },
            None => {
                self.requests.push(AccessRequest {
                    id: user,
                    status,
                    offer: None,
                });
                UpsertOutcome::Inserted
            },
        }
    }

    /// ACL level held by `user`, if any
    pub fn level_of(&self, user: Uuid) -> Option<AccessLevel> {
        self.users.iter().find(|u| u.id == user).map(|u| u.level)
    }

    /// Set the ACL level of `user`, replacing any existing entry
    pub fn set_user_level(&mut self, user: Uuid, level: AccessLevel) {
        match self.users.iter_mut().find(|u| u.id == user) {
            Some(entry) => entry.level = level,
            None => self.users.push(UserAccess { id: user, level }),
        }
    }
}
