//! Media enumeration and auxiliary folders
//!
//! The canonical order of a dataset's media is by item name. Preview frame
//! indices refer to positions in this order.

use dsx_common::types::{Dataset, DatasetType, Item, User};

use crate::store::{DatasetStore, MediaStore, StoreResult};

/// Name of the per-dataset folder holding derived files
pub const AUXILIARY_FOLDER: &str = "auxiliary";

fn sort_by_name(mut items: Vec<Item>) -> Vec<Item> {
    items.sort_by(|a, b| a.name.cmp(&b.name));
    items
}

/// Image frames of an image-sequence dataset
pub async fn valid_images(media: &dyn MediaStore, dataset: &Dataset) -> StoreResult<Vec<Item>> {
    let items = media.list_items(dataset.id).await?;
    Ok(sort_by_name(items.into_iter().filter(Item::is_image).collect()))
}

/// Tiled images of a large-image dataset
pub async fn valid_large_images(media: &dyn MediaStore, dataset: &Dataset) -> StoreResult<Vec<Item>> {
    let items = media.list_items(dataset.id).await?;
    Ok(sort_by_name(items.into_iter().filter(|i| i.large_image).collect()))
}

/// Previewable media for the dataset's type, `None` for other types
pub async fn valid_media(
    media: &dyn MediaStore,
    dataset: &Dataset,
) -> StoreResult<Option<Vec<Item>>> {
    match dataset.dataset_type() {
        Some(DatasetType::ImageSequence) => valid_images(media, dataset).await.map(Some),
        Some(DatasetType::LargeImage) => valid_large_images(media, dataset).await.map(Some),
        _ => Ok(None),
    }
}

/// Find or create the auxiliary child folder of `dataset`
pub async fn get_or_create_auxiliary_folder(
    datasets: &dyn DatasetStore,
    dataset: &Dataset,
    user: &User,
) -> StoreResult<Dataset> {
    if let Some(existing) = datasets
        .find_dataset_by_name(Some(dataset.id), AUXILIARY_FOLDER)
        .await?
    {
        return Ok(existing);
    }

    let mut folder = Dataset::new(AUXILIARY_FOLDER, Some(dataset.id), Some(user.id));
    folder.public = dataset.public;
    folder.access = dataset.access.clone();
    folder.access.requests.clear();
    datasets.insert_dataset(&folder).await?;
    tracing::debug!(dataset_id = %dataset.id, folder_id = %folder.id, "Created auxiliary folder");
    Ok(folder)
}
