//! Share / unshare command
//!
//! Sharing derives a public `<name>_shared` sibling of a dataset: every item
//! is copied, but file content only for the items picked by
//! [`select_preview_indices`]. Unsharing deletes the preview. Either way any
//! prior preview is removed first, so a source never has two.
//!
//! A preview carries its back reference from the moment it is inserted, so
//! one left half built by a failed share is still found and replaced. The
//! source document is never rewritten whole: only its preview reference is
//! swapped, atomically, leaving concurrent ACL and request writes intact.

use dsx_common::types::{AccessLevel, Dataset, DatasetMeta, Item, User};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::shared::{
    media::{get_or_create_auxiliary_folder, valid_media},
    require_access, verify_dataset, AuthzError, DatasetValidationError,
};
use crate::features::sharing::preview::select_preview_indices;
use crate::features::SharingState;
use crate::store::{DatasetStore, MediaStore, StoreError};

/// Command to create or remove the sharable preview of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareDatasetCommand {
    pub dataset_id: Uuid,
    pub user: User,
    pub share: bool,
}

/// Business outcome of a share command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ShareOutcome {
    PublicDataset,
    UnsuitableType,
    Created { preview_id: Uuid },
    Removed,
}

impl ShareOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ShareOutcome::PublicDataset => "Public datasets cannot be shared",
            ShareOutcome::UnsuitableType => "Dataset type not suitable for sharing",
            ShareOutcome::Created { .. } => "Sharable dataset created",
            ShareOutcome::Removed => "Sharable dataset removed",
        }
    }

    pub fn preview_id(&self) -> Option<Uuid> {
        match self {
            ShareOutcome::Created { preview_id } => Some(*preview_id),
            _ => None,
        }
    }
}

/// Errors that can occur when sharing a dataset
#[derive(Debug, thiserror::Error)]
pub enum ShareDatasetError {
    #[error("Dataset {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Validation(#[from] DatasetValidationError),

    /// The preview exists but was not fully populated; sharing again replaces it
    #[error("Sharable dataset {preview_id} was only partially created: {source}")]
    PartialCompletion {
        preview_id: Uuid,
        #[source]
        source: StoreError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<ShareOutcome, ShareDatasetError>> for ShareDatasetCommand {}

impl crate::cqrs::middleware::Command for ShareDatasetCommand {}

/// Handles the share command
///
/// Checks run in order: public dataset, ADMIN access, dataset validity and,
/// when sharing, the dataset type. Nothing is mutated before they pass.
#[tracing::instrument(skip(state, command), fields(dataset_id = %command.dataset_id, user = %command.user.login, share = command.share))]
pub async fn handle(
    state: SharingState,
    command: ShareDatasetCommand,
) -> Result<ShareOutcome, ShareDatasetError> {
    let source = state
        .datasets
        .find_dataset(command.dataset_id)
        .await?
        .ok_or(ShareDatasetError::NotFound(command.dataset_id))?;

    if source.public {
        tracing::debug!("Refusing to share a public dataset");
        return Ok(ShareOutcome::PublicDataset);
    }
    require_access(&source, &command.user, AccessLevel::Admin)?;
    verify_dataset(&source)?;
    if command.share && !source.dataset_type().is_some_and(|t| t.is_shareable()) {
        tracing::debug!(dataset_type = ?source.dataset_type(), "Dataset type not shareable");
        return Ok(ShareOutcome::UnsuitableType);
    }

    remove_prior_previews(&state, &source).await?;

    if !command.share {
        state.datasets.set_sharable_media_id(source.id, None).await?;
        tracing::info!(dataset_id = %source.id, "Sharable dataset removed");
        return Ok(ShareOutcome::Removed);
    }

    let preview = new_preview(&source, &command.user);
    state.datasets.insert_dataset(&preview).await?;

    populate_preview(&state, &source, preview, &command.user)
        .await
        .map_err(|(preview_id, source)| ShareDatasetError::PartialCompletion { preview_id, source })
}

/// Delete every preview of `source`: those carrying its back reference,
/// the one its reference points at, and a `<name>_shared` sibling without a
/// back reference
async fn remove_prior_previews(state: &SharingState, source: &Dataset) -> Result<(), StoreError> {
    let mut stale: Vec<Uuid> = state
        .datasets
        .find_previews_of(source.id)
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();
    stale.extend(source.meta.sharable_media_id);

    let by_name = state
        .datasets
        .find_dataset_by_name(source.parent_id, &source.shared_name())
        .await?;
    if let Some(sibling) = by_name.filter(|d| {
        d.id != source.id
            && d.is_sharable_preview()
            && d.original_media_id.map_or(true, |id| id == source.id)
    }) {
        stale.push(sibling.id);
    }

    stale.sort();
    stale.dedup();
    for preview_id in stale {
        if state.datasets.remove_dataset(preview_id).await? {
            tracing::info!(%preview_id, "Removed previous sharable dataset");
        }
    }
    Ok(())
}

fn new_preview(source: &Dataset, user: &User) -> Dataset {
    let mut preview = Dataset::new(source.shared_name(), source.parent_id, Some(user.id));
    preview.public = true;
    preview.description = source.description.clone();
    preview.size = source.size;
    preview.meta = DatasetMeta {
        sharable: false,
        sharable_media_id: None,
        ..source.meta.clone()
    };
    preview.original_media_id = Some(source.id);
    preview.access.set_user_level(user.id, AccessLevel::Admin);
    preview
}

async fn populate_preview(
    state: &SharingState,
    source: &Dataset,
    mut preview: Dataset,
    user: &User,
) -> Result<ShareOutcome, (Uuid, StoreError)> {
    let preview_id = preview.id;
    let fail = |e: StoreError| (preview_id, e);

    get_or_create_auxiliary_folder(state.datasets.as_ref(), &preview, user)
        .await
        .map_err(fail)?;
    let annotations = state
        .media
        .clone_annotations(source.id, preview.id)
        .await
        .map_err(fail)?;

    let items = valid_media(state.media.as_ref(), source)
        .await
        .map_err(fail)?
        .unwrap_or_default();
    let frames = select_preview_indices(items.len(), state.settings.preview_fraction);

    for (index, item) in items.iter().enumerate() {
        let copy = Item {
            id: Uuid::new_v4(),
            folder_id: preview.id,
            name: item.name.clone(),
            description: item.description.clone(),
            meta: item.meta.clone(),
            large_image: item.large_image,
            creator_id: Some(user.id),
            created: chrono::Utc::now(),
        };
        state.media.create_item(&copy).await.map_err(fail)?;
        if frames.binary_search(&index).is_ok() {
            state.media.copy_files(item.id, copy.id).await.map_err(fail)?;
        }
    }

    preview.meta.sharable = true;
    preview.meta.preview_frames = frames;
    preview.meta.original_media_name = Some(source.name.clone());
    state.datasets.save_dataset(&preview).await.map_err(fail)?;

    let previous = state
        .datasets
        .set_sharable_media_id(source.id, Some(preview_id))
        .await
        .map_err(fail)?;
    // A concurrent share published its preview after our clean-up
    if let Some(superseded) = previous.filter(|id| *id != preview_id) {
        if state.datasets.remove_dataset(superseded).await.map_err(fail)? {
            tracing::info!(preview_id = %superseded, "Removed superseded sharable dataset");
        }
    }

    tracing::info!(
        dataset_id = %source.id,
        preview_id = %preview.id,
        items = items.len(),
        preview_frames = preview.meta.preview_frames.len(),
        annotations,
        "Sharable dataset created"
    );
    Ok(ShareOutcome::Created { preview_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharingSettings;
    use crate::features::shared::test_helpers::{TestDataset, TestWorld};
    use crate::store::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use dsx_common::types::{Annotation, AnnotationKind, DatasetType, FileRecord};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Side effect injected into one media call
    #[derive(Debug, Clone, Copy)]
    enum Interference {
        /// The first `copy_files` fails
        FailFirstCopy,
        /// `reader` is granted READ on `source` while annotations are cloned
        GrantDuringClone { source: Uuid, reader: Uuid },
    }

    /// Media store that delegates to the world's backend, once interfering
    struct InterferingMedia {
        inner: Arc<MemoryStore>,
        interference: Interference,
        fired: AtomicBool,
    }

    impl InterferingMedia {
        fn install(world: &TestWorld, interference: Interference) -> SharingState {
            let mut state = world.state.clone();
            state.media = Arc::new(Self {
                inner: world.store.clone(),
                interference,
                fired: AtomicBool::new(false),
            });
            state
        }

        fn fire_once(&self) -> bool {
            !self.fired.swap(true, Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaStore for InterferingMedia {
        async fn list_items(&self, folder_id: Uuid) -> StoreResult<Vec<Item>> {
            self.inner.list_items(folder_id).await
        }

        async fn create_item(&self, item: &Item) -> StoreResult<()> {
            self.inner.create_item(item).await
        }

        async fn add_file(&self, file: &FileRecord) -> StoreResult<()> {
            self.inner.add_file(file).await
        }

        async fn list_files(&self, item_id: Uuid) -> StoreResult<Vec<FileRecord>> {
            self.inner.list_files(item_id).await
        }

        async fn copy_files(&self, from: Uuid, to: Uuid) -> StoreResult<usize> {
            if matches!(self.interference, Interference::FailFirstCopy) && self.fire_once() {
                return Err(StoreError::ItemNotFound(to));
            }
            self.inner.copy_files(from, to).await
        }

        async fn add_annotation(&self, annotation: &Annotation) -> StoreResult<()> {
            self.inner.add_annotation(annotation).await
        }

        async fn list_annotations(&self, dataset_id: Uuid) -> StoreResult<Vec<Annotation>> {
            self.inner.list_annotations(dataset_id).await
        }

        async fn clone_annotations(&self, source: Uuid, dest: Uuid) -> StoreResult<usize> {
            if let Interference::GrantDuringClone { source: id, reader } = self.interference {
                if self.fire_once() {
                    self.inner.set_user_access(id, reader, AccessLevel::Read).await?;
                }
            }
            self.inner.clone_annotations(source, dest).await
        }
    }

    fn share(dataset_id: Uuid, user: &User, share: bool) -> ShareDatasetCommand {
        ShareDatasetCommand {
            dataset_id,
            user: user.clone(),
            share,
        }
    }

    #[tokio::test]
    async fn test_share_creates_preview() {
        let world = TestWorld::with_settings(SharingSettings {
            preview_fraction: 0.2,
            ..SharingSettings::default()
        });
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(20).insert(&world).await;
        world
            .store
            .add_annotation(&Annotation {
                id: Uuid::new_v4(),
                dataset_id: source.id,
                kind: AnnotationKind::Track,
                body: serde_json::json!({"id": 0}),
            })
            .await
            .unwrap();

        let outcome = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        let preview_id = outcome.preview_id().unwrap();
        assert_eq!(outcome.message(), "Sharable dataset created");

        let preview = world.dataset(preview_id).await;
        assert_eq!(preview.name, "birds_shared");
        assert!(preview.public);
        assert!(preview.meta.sharable);
        assert!(preview.meta.annotate);
        assert_eq!(preview.meta.preview_frames, vec![0, 6, 13, 19]);
        assert_eq!(preview.meta.original_media_name.as_deref(), Some("birds"));
        assert_eq!(preview.meta.sharable_media_id, None);
        assert_eq!(preview.original_media_id, Some(source.id));
        assert_eq!(preview.creator_id, Some(owner.id));
        assert_eq!(preview.size, source.size);
        assert_eq!(preview.access.level_of(owner.id), Some(AccessLevel::Admin));

        let source = world.dataset(source.id).await;
        assert_eq!(source.meta.sharable_media_id, Some(preview_id));

        let items = world.store.list_items(preview_id).await.unwrap();
        assert_eq!(items.len(), 20);
        let mut with_files = Vec::new();
        let mut sorted = items;
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        for (index, item) in sorted.iter().enumerate() {
            if !world.store.list_files(item.id).await.unwrap().is_empty() {
                with_files.push(index);
            }
        }
        assert_eq!(with_files, vec![0, 6, 13, 19]);

        assert_eq!(world.store.list_annotations(preview_id).await.unwrap().len(), 1);
        assert!(world
            .store
            .find_dataset_by_name(Some(preview_id), "auxiliary")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_default_fraction_keeps_first_frame() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(20).insert(&world).await;

        let outcome = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        let preview = world.dataset(outcome.preview_id().unwrap()).await;
        assert_eq!(preview.meta.preview_frames, vec![0]);
    }

    #[tokio::test]
    async fn test_large_image_preview_keeps_flag() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "slides")
            .with_type(DatasetType::LargeImage)
            .with_frames(3)
            .insert(&world)
            .await;

        let outcome = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        let items = world.store.list_items(outcome.preview_id().unwrap()).await.unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.large_image));
    }

    #[tokio::test]
    async fn test_reshare_replaces_preview() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(5).insert(&world).await;

        let first = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        let second = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        let (first, second) = (first.preview_id().unwrap(), second.preview_id().unwrap());
        assert_ne!(first, second);

        assert!(world.store.find_dataset(first).await.unwrap().is_none());
        assert!(world.store.list_items(first).await.unwrap().is_empty());
        let previews = world
            .store
            .find_dataset_by_name(None, "birds_shared")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previews.id, second);
        // source + preview + auxiliary
        assert_eq!(world.store.folder_count().await, 3);
    }

    #[tokio::test]
    async fn test_unshare_after_share() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(5).insert(&world).await;

        let created = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        let removed = handle(world.state.clone(), share(source.id, &owner, false)).await.unwrap();
        assert_eq!(removed, ShareOutcome::Removed);
        assert_eq!(removed.message(), "Sharable dataset removed");

        assert!(world.store.find_dataset(created.preview_id().unwrap()).await.unwrap().is_none());
        let source = world.dataset(source.id).await;
        assert_eq!(source.meta.sharable_media_id, None);
        assert_eq!(world.store.folder_count().await, 1);
    }

    #[tokio::test]
    async fn test_public_dataset_is_refused() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").public().insert(&world).await;

        let outcome = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        assert_eq!(outcome, ShareOutcome::PublicDataset);
        assert_eq!(world.store.folder_count().await, 1);
    }

    #[tokio::test]
    async fn test_unsuitable_type_leaves_existing_preview() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(4).insert(&world).await;
        let created = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();

        let mut video = world.dataset(source.id).await;
        video.meta.dataset_type = Some(DatasetType::Video);
        world.store.save_dataset(&video).await.unwrap();

        let outcome = handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();
        assert_eq!(outcome, ShareOutcome::UnsuitableType);
        assert!(world
            .store
            .find_dataset(created.preview_id().unwrap())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_requires_admin() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let stranger = world.user("stranger").await;
        let source = TestDataset::new(&owner, "birds").insert(&world).await;

        let result = handle(world.state.clone(), share(source.id, &stranger, true)).await;
        assert!(matches!(result, Err(ShareDatasetError::Authz(_))));
        assert_eq!(world.store.folder_count().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_dataset_and_missing_dataset() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let mut plain = Dataset::new("plain", None, Some(owner.id));
        plain.access.set_user_level(owner.id, AccessLevel::Admin);
        world.store.insert_dataset(&plain).await.unwrap();

        let result = handle(world.state.clone(), share(plain.id, &owner, true)).await;
        assert!(matches!(result, Err(ShareDatasetError::Validation(_))));

        let missing = handle(world.state.clone(), share(Uuid::new_v4(), &owner, true)).await;
        assert!(matches!(missing, Err(ShareDatasetError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reshare_replaces_partially_created_preview() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(5).insert(&world).await;

        let flaky = InterferingMedia::install(&world, Interference::FailFirstCopy);
        let partial = match handle(flaky.clone(), share(source.id, &owner, true)).await {
            Err(ShareDatasetError::PartialCompletion { preview_id, .. }) => preview_id,
            other => panic!("expected a partial completion, got {other:?}"),
        };

        let left_over = world.dataset(partial).await;
        assert!(!left_over.meta.sharable);
        assert_eq!(left_over.original_media_id, Some(source.id));
        assert_eq!(world.dataset(source.id).await.meta.sharable_media_id, None);

        let outcome = handle(flaky, share(source.id, &owner, true)).await.unwrap();
        let preview_id = outcome.preview_id().unwrap();
        assert_ne!(preview_id, partial);
        assert!(world.store.find_dataset(partial).await.unwrap().is_none());
        assert_eq!(world.store.find_previews_of(source.id).await.unwrap().len(), 1);
        assert_eq!(world.dataset(source.id).await.meta.sharable_media_id, Some(preview_id));
        // source + preview + auxiliary
        assert_eq!(world.store.folder_count().await, 3);
    }

    #[tokio::test]
    async fn test_unshare_removes_partially_created_preview() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let source = TestDataset::new(&owner, "birds").with_frames(5).insert(&world).await;

        let flaky = InterferingMedia::install(&world, Interference::FailFirstCopy);
        assert!(handle(flaky, share(source.id, &owner, true)).await.is_err());

        let outcome = handle(world.state.clone(), share(source.id, &owner, false)).await.unwrap();
        assert_eq!(outcome, ShareOutcome::Removed);
        assert!(world.store.find_previews_of(source.id).await.unwrap().is_empty());
        assert_eq!(world.store.folder_count().await, 1);
    }

    #[tokio::test]
    async fn test_share_keeps_acl_written_while_populating() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let carol = world.user("carol").await;
        let source = TestDataset::new(&owner, "birds").with_frames(5).insert(&world).await;

        let state = InterferingMedia::install(
            &world,
            Interference::GrantDuringClone {
                source: source.id,
                reader: carol.id,
            },
        );
        let outcome = handle(state, share(source.id, &owner, true)).await.unwrap();

        let source = world.dataset(source.id).await;
        assert_eq!(source.access.level_of(carol.id), Some(AccessLevel::Read));
        assert_eq!(source.access.level_of(owner.id), Some(AccessLevel::Admin));
        assert_eq!(source.meta.sharable_media_id, outcome.preview_id());
    }

    #[tokio::test]
    async fn test_unshare_only_clears_preview_reference() {
        let world = TestWorld::new();
        let owner = world.user("owner").await;
        let reader = world.user("reader").await;
        let source = TestDataset::new(&owner, "birds").with_frames(5).insert(&world).await;
        handle(world.state.clone(), share(source.id, &owner, true)).await.unwrap();

        world
            .store
            .set_user_access(source.id, reader.id, AccessLevel::Read)
            .await
            .unwrap();
        handle(world.state.clone(), share(source.id, &owner, false)).await.unwrap();

        let source = world.dataset(source.id).await;
        assert_eq!(source.meta.sharable_media_id, None);
        assert_eq!(source.access.level_of(reader.id), Some(AccessLevel::Read));
    }
}
