//! Dataset documents
//!
//! A dataset is a folder-like container of media items. The JSON shape of
//! [`Dataset`] is the persisted document shape that list pipelines match on,
//! so field names here are part of the storage contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::access::AccessList;

/// Suffix appended to a source dataset's name to form its preview's name
pub const SHARED_SUFFIX: &str = "_shared";

/// Kind of media a dataset holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetType {
    ImageSequence,
    LargeImage,
    Video,
    #[serde(other)]
    Other,
}

impl DatasetType {
    /// Only image sequences and large-image sets can be previewed
    pub fn is_shareable(self) -> bool {
        matches!(self, DatasetType::ImageSequence | DatasetType::LargeImage)
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetType::ImageSequence => write!(f, "image-sequence"),
            DatasetType::LargeImage => write!(f, "large-image"),
            DatasetType::Video => write!(f, "video"),
            DatasetType::Other => write!(f, "other"),
        }
    }
}

/// The `meta` mapping of a dataset document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMeta {
    #[serde(default)]
    pub annotate: bool,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<DatasetType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,

    #[serde(default)]
    pub sharable: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preview_frames: Vec<usize>,

    /// Reference from a source dataset to its live preview; `""` when cleared
    #[serde(default, with = "empty_as_none")]
    pub sharable_media_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_media_name: Option<String>,

    /// Any other metadata (confidence filters, custom attributes, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A dataset (folder) document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub creator_id: Option<Uuid>,
    #[serde(default)]
    pub public: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub meta: DatasetMeta,
    #[serde(default)]
    pub access: AccessList,
    /// Back reference from a preview to the dataset it was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_media_id: Option<Uuid>,
}

impl Dataset {
    /// New private, empty dataset with a fresh id
    pub fn new(name: impl Into<String>, parent_id: Option<Uuid>, creator_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            parent_id,
            creator_id,
            public: false,
            created: now,
            updated: now,
            size: 0,
            meta: DatasetMeta::default(),
            access: AccessList::default(),
            original_media_id: None,
        }
    }

    /// Name of the preview derived from this dataset
    pub fn shared_name(&self) -> String {
        format!("{}{}", self.name, SHARED_SUFFIX)
    }

    /// Whether this document is a sharable preview of another dataset
    pub fn is_sharable_preview(&self) -> bool {
        self.meta.sharable
    }

    pub fn dataset_type(&self) -> Option<DatasetType> {
        self.meta.dataset_type
    }

    pub fn touch(&mut self) {
        self.updated = Utc::now();
    }
}

/// `Option<Uuid>` persisted as the id string or `""`
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(value: &Option<Uuid>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Uuid>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => Uuid::parse_str(s).map(Some).map_err(serde::de::Error::custom),
        }
    }
}
