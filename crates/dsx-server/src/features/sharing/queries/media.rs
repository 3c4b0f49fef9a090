//! Preview media query
//!
//! Lists a preview's media in canonical order. Only items whose index is in
//! `meta.previewFrames` carry an id and a URL; the rest are placeholders
//! with a filename.

use dsx_common::types::{AccessLevel, Dataset, DatasetType, Item, MediaResource, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::shared::{
    media::{valid_images, valid_large_images},
    require_access, verify_sharable_dataset, AuthzError, DatasetValidationError,
};
use crate::features::SharingState;
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewMediaQuery {
    pub dataset_id: Uuid,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMediaResponse {
    pub image_data: Vec<MediaResource>,
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewMediaError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Validation(#[from] DatasetValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<PreviewMediaResponse, PreviewMediaError>> for PreviewMediaQuery {}

impl crate::cqrs::middleware::Query for PreviewMediaQuery {}

fn image_url(dataset: &Dataset, item: &Item) -> String {
    format!("/api/v1/datasets/{}/media/{}/download", dataset.id, item.id)
}

fn large_image_url(_dataset: &Dataset, item: &Item) -> String {
    format!("/api/v1/item/{}/tiles/internal_metadata", item.id)
}

#[tracing::instrument(skip(state, query), fields(dataset_id = %query.dataset_id, user = %query.user.login))]
pub async fn handle(
    state: SharingState,
    query: PreviewMediaQuery,
) -> Result<PreviewMediaResponse, PreviewMediaError> {
    let preview = state
        .datasets
        .find_dataset(query.dataset_id)
        .await?
        .ok_or(PreviewMediaError::NotFound(query.dataset_id))?;

    verify_sharable_dataset(&preview)?;
    require_access(&preview, &query.user, AccessLevel::Read)?;

    let (items, url): (Vec<Item>, fn(&Dataset, &Item) -> String) = match preview.dataset_type() {
        Some(DatasetType::ImageSequence) => (valid_images(state.media.as_ref(), &preview).await?, image_url),
        Some(DatasetType::LargeImage) => {
            (valid_large_images(state.media.as_ref(), &preview).await?, large_image_url)
        },
        other => {
            let name = other.map_or_else(|| "none".to_string(), |t| t.to_string());
            return Err(DatasetValidationError::UnsupportedType(name).into());
        },
    };

    let image_data = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            if preview.meta.preview_frames.contains(&index) {
                MediaResource {
                    id: item.id.to_string(),
                    url: url(&preview, item),
                    filename: item.name.clone(),
                }
            } else {
                MediaResource {
                    id: String::new(),
                    url: String::new(),
                    filename: item.name.clone(),
                }
            }
        })
        .collect();

    Ok(PreviewMediaResponse { image_data })
}
