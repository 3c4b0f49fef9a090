//! Media items, their files and annotation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// File extensions recognised as frames of an image sequence
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp", "gif"];

/// A media item inside a dataset folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub folder_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    /// Set when the item holds a tiled large image
    #[serde(default)]
    pub large_image: bool,
    #[serde(default)]
    pub creator_id: Option<Uuid>,
    pub created: DateTime<Utc>,
}

impl Item {
    pub fn new(folder_id: Uuid, name: impl Into<String>, creator_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            folder_id,
            name: name.into(),
            description: String::new(),
            meta: Map::new(),
            large_image: false,
            creator_id,
            created: Utc::now(),
        }
    }

    /// Lower-cased extension of the item name, if it has one
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// A stored file attached to an item
///
/// Copies share the same `storage_key`; content is never duplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub storage_key: String,
    #[serde(default)]
    pub creator_id: Option<Uuid>,
    pub created: DateTime<Utc>,
}

/// Kind of annotation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Track,
    Group,
}

impl AnnotationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AnnotationKind::Track => "track",
            AnnotationKind::Group => "group",
        }
    }
}

/// A track or group annotation attached to a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub kind: AnnotationKind,
    #[serde(default)]
    pub body: Value,
}

/// View of one media item in a preview; never persisted
///
/// `id` and `url` are empty strings for placeholder (non-preview) items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaResource {
    pub id: String,
    pub url: String,
    pub filename: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_detection() {
        let folder = Uuid::new_v4();
        assert!(Item::new(folder, "frame_0001.PNG", None).is_image());
        assert!(Item::new(folder, "a.b.jpeg", None).is_image());
        assert!(!Item::new(folder, "annotations.json", None).is_image());
        assert!(!Item::new(folder, "README", None).is_image());
        assert!(!Item::new(folder, "trailing.", None).is_image());
    }
}
