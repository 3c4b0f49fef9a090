//! Domain types shared by DSX components

pub mod access;
pub mod dataset;
pub mod media;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use access::{AccessLevel, AccessList, AccessRequest, RequestStatus, UpsertOutcome, UserAccess};
pub use dataset::{Dataset, DatasetMeta, DatasetType, SHARED_SUFFIX};
pub use media::{Annotation, AnnotationKind, FileRecord, Item, MediaResource, IMAGE_EXTENSIONS};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub login: String,
    /// Site administrator
    #[serde(default)]
    pub admin: bool,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            login: login.into(),
            admin: false,
        }
    }

    pub fn admin(login: impl Into<String>) -> Self {
        Self {
            admin: true,
            ..Self::new(login)
        }
    }
}
