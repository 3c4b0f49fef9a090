//! Structural dataset checks
//!
//! These run before any mutation and never touch storage.

use dsx_common::types::Dataset;
use thiserror::Error;
use uuid::Uuid;

/// A dataset document is not usable for the requested operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetValidationError {
    #[error("Folder {0} is not a valid dataset")]
    NotADataset(Uuid),

    #[error("Dataset {0} is not a sharable preview")]
    NotSharable(Uuid),

    #[error("Sharable dataset {0} has no source dataset")]
    MissingSource(Uuid),

    #[error("Unrecognized source type: {0}")]
    UnsupportedType(String),
}

/// A folder is a dataset when it is marked annotatable
pub fn verify_dataset(dataset: &Dataset) -> Result<(), DatasetValidationError> {
    if !dataset.meta.annotate {
        return Err(DatasetValidationError::NotADataset(dataset.id));
    }
    Ok(())
}

/// A dataset that is also a sharable preview
pub fn verify_sharable_dataset(dataset: &Dataset) -> Result<(), DatasetValidationError> {
    verify_dataset(dataset)?;
    if !dataset.is_sharable_preview() {
        return Err(DatasetValidationError::NotSharable(dataset.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_dataset_requires_annotate() {
        let mut folder = Dataset::new("plain", None, None);
        assert_eq!(verify_dataset(&folder), Err(DatasetValidationError::NotADataset(folder.id)));
        folder.meta.annotate = true;
        assert!(verify_dataset(&folder).is_ok());
    }

    #[test]
    fn test_verify_sharable_dataset() {
        let mut dataset = Dataset::new("birds", None, None);
        dataset.meta.annotate = true;
        assert_eq!(
            verify_sharable_dataset(&dataset),
            Err(DatasetValidationError::NotSharable(dataset.id))
        );
        dataset.meta.sharable = true;
        assert!(verify_sharable_dataset(&dataset).is_ok());
    }
}
