//! In-memory backend
//!
//! All collections live behind a single `tokio::sync::RwLock`, so every write
//! is atomic with respect to every other operation.

use async_trait::async_trait;
use chrono::Utc;
use dsx_common::types::{
    AccessLevel, Annotation, Dataset, FileRecord, Item, RequestStatus, UpsertOutcome, User,
};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::pipeline::{Collection, Pipeline, Snapshot};
use super::{DatasetStore, MediaStore, StoreError, StoreResult, UserDirectory};

#[derive(Debug, Default)]
struct Collections {
    folders: HashMap<Uuid, Dataset>,
    items: Vec<Item>,
    files: Vec<FileRecord>,
    annotations: Vec<Annotation>,
    users: HashMap<Uuid, User>,
}

impl Collections {
    fn remove_folder(&mut self, id: Uuid) -> bool {
        if self.folders.remove(&id).is_none() {
            return false;
        }

        let children: Vec<Uuid> = self
            .folders
            .values()
            .filter(|f| f.parent_id == Some(id))
            .map(|f| f.id)
            .collect();
        for child in children {
            self.remove_folder(child);
        }

        let removed_items: Vec<Uuid> = self
            .items
            .iter()
            .filter(|i| i.folder_id == id)
            .map(|i| i.id)
            .collect();
        self.items.retain(|i| i.folder_id != id);
        self.files.retain(|f| !removed_items.contains(&f.item_id));
        self.annotations.retain(|a| a.dataset_id != id);
        true
    }

    fn folder_mut(&mut self, id: Uuid) -> StoreResult<&mut Dataset> {
        self.folders.get_mut(&id).ok_or(StoreError::DatasetNotFound(id))
    }

    fn snapshot(&self, pipeline: &Pipeline, input: Collection) -> StoreResult<Snapshot> {
        let mut wanted = pipeline.lookup_collections();
        wanted.insert(input);

        let mut snapshot = Snapshot::default();
        for collection in wanted {
            let docs = match collection {
                Collection::Folders => {
                    let mut folders: Vec<&Dataset> = self.folders.values().collect();
                    folders.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
                    folders
                        .into_iter()
                        .map(serde_json::to_value)
                        .collect::<Result<Vec<_>, _>>()?
                },
                Collection::Users => self
                    .users
                    .values()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()?,
            };
            snapshot.insert(collection, docs);
        }
        Ok(snapshot)
    }
}

/// Backend holding everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user
    pub async fn add_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id, user);
    }

    /// Number of stored folders, including auxiliary folders
    pub async fn folder_count(&self) -> usize {
        self.inner.read().await.folders.len()
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn find_dataset(&self, id: Uuid) -> StoreResult<Option<Dataset>> {
        Ok(self.inner.read().await.folders.get(&id).cloned())
    }

    async fn find_dataset_by_name(
        &self,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> StoreResult<Option<Dataset>> {
        let inner = self.inner.read().await;
        Ok(inner
            .folders
            .values()
            .find(|f| f.parent_id == parent_id && f.name == name)
            .cloned())
    }

    async fn insert_dataset(&self, dataset: &Dataset) -> StoreResult<()> {
        self.inner
            .write()
            .await
            .folders
            .insert(dataset.id, dataset.clone());
        Ok(())
    }

    async fn save_dataset(&self, dataset: &Dataset) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.folder_mut(dataset.id)?;
        *stored = dataset.clone();
        stored.updated = Utc::now();
        Ok(())
    }

    async fn remove_dataset(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.write().await.remove_folder(id))
    }

    async fn find_previews_of(&self, source: Uuid) -> StoreResult<Vec<Dataset>> {
        let inner = self.inner.read().await;
        let mut previews: Vec<Dataset> = inner
            .folders
            .values()
            .filter(|f| f.original_media_id == Some(source))
            .cloned()
            .collect();
        previews.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        Ok(previews)
    }

    async fn set_sharable_media_id(&self, id: Uuid, preview: Option<Uuid>) -> StoreResult<Option<Uuid>> {
        let mut inner = self.inner.write().await;
        let folder = inner.folder_mut(id)?;
        let previous = std::mem::replace(&mut folder.meta.sharable_media_id, preview);
        folder.touch();
        Ok(previous)
    }

    async fn upsert_access_request(
        &self,
        id: Uuid,
        user: Uuid,
        status: RequestStatus,
        keep_if: &[RequestStatus],
    ) -> StoreResult<UpsertOutcome> {
        let mut inner = self.inner.write().await;
        let folder = inner.folder_mut(id)?;
        let outcome = folder.access.upsert_request(user, status, keep_if);
        if outcome.applied() {
            folder.touch();
        }
        Ok(outcome)
    }

    async fn set_request_offer(&self, id: Uuid, user: Uuid, offer: Option<Uuid>) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let folder = inner.folder_mut(id)?;
        let found = folder.access.set_offer(user, offer);
        if found {
            folder.touch();
        }
        Ok(found)
    }

    async fn set_user_access(&self, id: Uuid, user: Uuid, level: AccessLevel) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let folder = inner.folder_mut(id)?;
        folder.access.set_user_level(user, level);
        folder.touch();
        Ok(())
    }

    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> StoreResult<Vec<Value>> {
        let snapshot = self.inner.read().await.snapshot(pipeline, collection)?;
        Ok(snapshot.aggregate(collection, pipeline))
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn list_items(&self, folder_id: Uuid) -> StoreResult<Vec<Item>> {
        let inner = self.inner.read().await;
        Ok(inner
            .items
            .iter()
            .filter(|i| i.folder_id == folder_id)
            .cloned()
            .collect())
    }

    async fn create_item(&self, item: &Item) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.folders.contains_key(&item.folder_id) {
            return Err(StoreError::DatasetNotFound(item.folder_id));
        }
        inner.items.push(item.clone());
        Ok(())
    }

    async fn add_file(&self, file: &FileRecord) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.items.iter().any(|i| i.id == file.item_id) {
            return Err(StoreError::ItemNotFound(file.item_id));
        }
        inner.files.push(file.clone());
        Ok(())
    }

    async fn list_files(&self, item_id: Uuid) -> StoreResult<Vec<FileRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .files
            .iter()
            .filter(|f| f.item_id == item_id)
            .cloned()
            .collect())
    }

    async fn copy_files(&self, from: Uuid, to: Uuid) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        if !inner.items.iter().any(|i| i.id == to) {
            return Err(StoreError::ItemNotFound(to));
        }
        let copies: Vec<FileRecord> = inner
            .files
            .iter()
            .filter(|f| f.item_id == from)
            .map(|f| FileRecord {
                id: Uuid::new_v4(),
                item_id: to,
                created: Utc::now(),
                ..f.clone()
            })
            .collect();
        let copied = copies.len();
        inner.files.extend(copies);
        Ok(copied)
    }

    async fn add_annotation(&self, annotation: &Annotation) -> StoreResult<()> {
        self.inner.write().await.annotations.push(annotation.clone());
        Ok(())
    }

    async fn list_annotations(&self, dataset_id: Uuid) -> StoreResult<Vec<Annotation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .annotations
            .iter()
            .filter(|a| a.dataset_id == dataset_id)
            .cloned()
            .collect())
    }

    async fn clone_annotations(&self, source: Uuid, dest: Uuid) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let clones: Vec<Annotation> = inner
            .annotations
            .iter()
            .filter(|a| a.dataset_id == source)
            .map(|a| Annotation {
                id: Uuid::new_v4(),
                dataset_id: dest,
                ..a.clone()
            })
            .collect();
        let cloned = clones.len();
        inner.annotations.extend(clones);
        Ok(cloned)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.login == login).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::pipeline::{Filter, Stage};
    use dsx_common::types::AnnotationKind;
    use serde_json::json;
    use std::sync::Arc;

    fn file(item_id: Uuid, name: &str) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            item_id,
            name: name.to_string(),
            size: 10,
            mime_type: Some("image/png".to_string()),
            storage_key: format!("blobs/{name}"),
            creator_id: None,
            created: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_remove_dataset_cascades() {
        let store = MemoryStore::new();
        let parent = Dataset::new("birds", None, None);
        let child = Dataset::new("auxiliary", Some(parent.id), None);
        let other = Dataset::new("fish", None, None);
        store.insert_dataset(&parent).await.unwrap();
        store.insert_dataset(&child).await.unwrap();
        store.insert_dataset(&other).await.unwrap();

        let item = Item::new(parent.id, "0001.png", None);
        store.create_item(&item).await.unwrap();
        store.add_file(&file(item.id, "0001.png")).await.unwrap();
        store
            .add_annotation(&Annotation {
                id: Uuid::new_v4(),
                dataset_id: parent.id,
                kind: AnnotationKind::Track,
                body: json!({"id": 1}),
            })
            .await
            .unwrap();

        assert!(store.remove_dataset(parent.id).await.unwrap());
        assert!(!store.remove_dataset(parent.id).await.unwrap());
        assert!(store.find_dataset(child.id).await.unwrap().is_none());
        assert!(store.list_items(parent.id).await.unwrap().is_empty());
        assert!(store.list_files(item.id).await.unwrap().is_empty());
        assert!(store.list_annotations(parent.id).await.unwrap().is_empty());
        assert_eq!(store.folder_count().await, 1);
    }

    #[tokio::test]
    async fn test_copy_files_shares_storage_keys() {
        let store = MemoryStore::new();
        let folder = Dataset::new("birds", None, None);
        store.insert_dataset(&folder).await.unwrap();
        let from = Item::new(folder.id, "a.png", None);
        let to = Item::new(folder.id, "a.png", None);
        store.create_item(&from).await.unwrap();
        store.create_item(&to).await.unwrap();
        store.add_file(&file(from.id, "a.png")).await.unwrap();

        assert_eq!(store.copy_files(from.id, to.id).await.unwrap(), 1);
        let copied = store.list_files(to.id).await.unwrap();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].storage_key, "blobs/a.png");

        let missing = store.copy_files(from.id, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(StoreError::ItemNotFound(_))));
    }

    #[tokio::test]
    async fn test_upsert_on_missing_dataset() {
        let store = MemoryStore::new();
        let result = store
            .upsert_access_request(Uuid::new_v4(), Uuid::new_v4(), RequestStatus::Pending, &[])
            .await;
        assert!(matches!(result, Err(StoreError::DatasetNotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_one_entry_per_user() {
        let store = Arc::new(MemoryStore::new());
        let dataset = Dataset::new("birds_shared", None, None);
        store.insert_dataset(&dataset).await.unwrap();

        let users: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let mut handles = Vec::new();
        for round in 0..4 {
            for user in &users {
                let store = store.clone();
                let user = *user;
                let id = dataset.id;
                handles.push(tokio::spawn(async move {
                    let guard = if round == 0 {
                        vec![]
                    } else {
                        vec![RequestStatus::Pending, RequestStatus::Granted]
                    };
                    store
                        .upsert_access_request(id, user, RequestStatus::Pending, &guard)
                        .await
                        .unwrap()
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.find_dataset(dataset.id).await.unwrap().unwrap();
        assert_eq!(stored.access.requests.len(), users.len());
        for user in &users {
            assert_eq!(stored.access.status_of(*user), Some(RequestStatus::Pending));
        }
    }

    #[tokio::test]
    async fn test_sharable_media_id_keeps_concurrent_acl_writes() {
        let store = MemoryStore::new();
        let source = Dataset::new("birds", None, None);
        store.insert_dataset(&source).await.unwrap();
        let reader = Uuid::new_v4();
        let preview = Uuid::new_v4();

        // A stale copy read before the ACL write
        let stale = store.find_dataset(source.id).await.unwrap().unwrap();
        store.set_user_access(source.id, reader, AccessLevel::Read).await.unwrap();

        assert_eq!(store.set_sharable_media_id(stale.id, Some(preview)).await.unwrap(), None);
        let stored = store.find_dataset(source.id).await.unwrap().unwrap();
        assert_eq!(stored.meta.sharable_media_id, Some(preview));
        assert_eq!(stored.access.level_of(reader), Some(AccessLevel::Read));

        assert_eq!(store.set_sharable_media_id(source.id, None).await.unwrap(), Some(preview));
        let missing = store.set_sharable_media_id(Uuid::new_v4(), None).await;
        assert!(matches!(missing, Err(StoreError::DatasetNotFound(_))));
    }

    #[tokio::test]
    async fn test_find_previews_of_follows_back_reference() {
        let store = MemoryStore::new();
        let source = Dataset::new("birds", None, None);
        let mut partial = Dataset::new("birds_shared", None, None);
        partial.original_media_id = Some(source.id);
        let mut other = Dataset::new("fish_shared", None, None);
        other.original_media_id = Some(Uuid::new_v4());
        for dataset in [&source, &partial, &other] {
            store.insert_dataset(dataset).await.unwrap();
        }

        let found = store.find_previews_of(source.id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, partial.id);
    }

    #[tokio::test]
    async fn test_set_request_offer_requires_entry() {
        let store = MemoryStore::new();
        let preview = Dataset::new("birds_shared", None, None);
        store.insert_dataset(&preview).await.unwrap();
        let (user, offered) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(!store.set_request_offer(preview.id, user, Some(offered)).await.unwrap());
        store
            .upsert_access_request(preview.id, user, RequestStatus::Pending, &[])
            .await
            .unwrap();
        assert!(store.set_request_offer(preview.id, user, Some(offered)).await.unwrap());

        let stored = store.find_dataset(preview.id).await.unwrap().unwrap();
        assert_eq!(stored.access.request_of(user).and_then(|r| r.offer), Some(offered));
    }

    #[tokio::test]
    async fn test_aggregate_joins_users() {
        let store = MemoryStore::new();
        let owner = User::new("alice");
        store.add_user(owner.clone()).await;
        let mut dataset = Dataset::new("birds", None, Some(owner.id));
        dataset.meta.annotate = true;
        store.insert_dataset(&dataset).await.unwrap();

        let pipeline = Pipeline::new()
            .stage(Stage::Match(Filter::eq("meta.annotate", true)))
            .stage(Stage::Lookup {
                from: Collection::Users,
                local_field: "creatorId".into(),
                foreign_field: "_id".into(),
                as_field: "ownerLogin".into(),
            })
            .stage(Stage::First("ownerLogin".into()))
            .stage(Stage::SetFromPath {
                field: "ownerLogin".into(),
                path: "ownerLogin.login".into(),
            });
        let out = store.aggregate(Collection::Folders, &pipeline).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["ownerLogin"], "alice");
    }

    #[tokio::test]
    async fn test_find_by_name_is_scoped_to_parent() {
        let store = MemoryStore::new();
        let root = Dataset::new("root", None, None);
        let a = Dataset::new("birds_shared", Some(root.id), None);
        let b = Dataset::new("birds_shared", None, None);
        store.insert_dataset(&root).await.unwrap();
        store.insert_dataset(&a).await.unwrap();
        store.insert_dataset(&b).await.unwrap();

        let found = store
            .find_dataset_by_name(Some(root.id), "birds_shared")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, a.id);
        let top = store.find_dataset_by_name(None, "birds_shared").await.unwrap().unwrap();
        assert_eq!(top.id, b.id);
    }
}
