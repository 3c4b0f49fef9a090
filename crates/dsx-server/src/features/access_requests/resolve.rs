//! Canonical request targets
//!
//! Request state lives on the preview. A request against a source dataset is
//! redirected to the preview its `meta.sharableMediaId` references.

use dsx_common::types::Dataset;

use crate::store::{DatasetStore, StoreResult};

/// The preview holding request state for `dataset`, if it is shared
pub async fn request_target(datasets: &dyn DatasetStore, dataset: &Dataset) -> StoreResult<Option<Dataset>> {
    if dataset.is_sharable_preview() {
        return Ok(Some(dataset.clone()));
    }
    match dataset.meta.sharable_media_id {
        Some(preview_id) => Ok(datasets
            .find_dataset(preview_id)
            .await?
            .filter(Dataset::is_sharable_preview)),
        None => Ok(None),
    }
}

/// The dataset a preview was derived from
pub async fn source_of(datasets: &dyn DatasetStore, preview: &Dataset) -> StoreResult<Option<Dataset>> {
    match preview.original_media_id {
        Some(source_id) => datasets.find_dataset(source_id).await,
        None => Ok(None),
    }
}
