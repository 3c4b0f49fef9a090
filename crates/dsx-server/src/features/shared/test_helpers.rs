//! Test helpers and fixtures
//!
//! Builders over the in-memory backend so handler tests read as scenarios.
//!
//! # Examples
//!
//! ```rust,ignore
//! use dsx_server::features::shared::test_helpers::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let mut world = TestWorld::new();
//!     let owner = world.user("owner").await;
//!     let dataset = TestDataset::new(&owner, "birds")
//!         .with_frames(20)
//!         .insert(&world)
//!         .await;
//!     // ... test logic ...
//!     let events = world.drain_events();
//! }
//! ```

use chrono::{Duration, Utc};
use dsx_common::types::{AccessLevel, Dataset, DatasetType, FileRecord, Item, User};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::config::SharingSettings;
use crate::events::{ChannelNotifier, SharingEvent};
use crate::features::SharingState;
use crate::store::{DatasetStore, MediaStore, MemoryStore};

/// In-memory backend, state and captured events
pub struct TestWorld {
    pub store: Arc<MemoryStore>,
    pub state: SharingState,
    events: UnboundedReceiver<SharingEvent>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_settings(SharingSettings::default())
    }

    pub fn with_settings(settings: SharingSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let (notifier, events) = ChannelNotifier::new();
        let state = SharingState::from_backend(store.clone(), settings).with_notifier(Arc::new(notifier));
        Self {
            store,
            state,
            events,
        }
    }

    /// Register a regular user
    pub async fn user(&self, login: &str) -> User {
        let user = User::new(login);
        self.store.add_user(user.clone()).await;
        user
    }

    /// Register a site administrator
    pub async fn site_admin(&self, login: &str) -> User {
        let user = User::admin(login);
        self.store.add_user(user.clone()).await;
        user
    }

    pub async fn dataset(&self, id: Uuid) -> Dataset {
        self.store
            .find_dataset(id)
            .await
            .expect("store read")
            .expect("dataset exists")
    }

    /// Events emitted since the last drain
    pub fn drain_events(&mut self) -> Vec<SharingEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

/// Builder for source datasets with frames and files
#[derive(Debug, Clone)]
pub struct TestDataset {
    pub owner: User,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub dataset_type: DatasetType,
    pub frames: usize,
    pub public: bool,
    pub created_offset_secs: i64,
}

impl TestDataset {
    pub fn new(owner: &User, name: &str) -> Self {
        Self {
            owner: owner.clone(),
            name: name.to_string(),
            parent_id: None,
            dataset_type: DatasetType::ImageSequence,
            frames: 20,
            public: false,
            created_offset_secs: 0,
        }
    }

    pub fn with_type(mut self, dataset_type: DatasetType) -> Self {
        self.dataset_type = dataset_type;
        self
    }

    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Shift the creation time, for sort tests
    pub fn created_offset(mut self, secs: i64) -> Self {
        self.created_offset_secs = secs;
        self
    }

    /// Insert the dataset, one item per frame and one file per item
    pub async fn insert(self, world: &TestWorld) -> Dataset {
        let mut dataset = Dataset::new(&self.name, self.parent_id, Some(self.owner.id));
        dataset.public = self.public;
        dataset.meta.annotate = true;
        dataset.meta.dataset_type = Some(self.dataset_type);
        dataset.meta.fps = Some(10.0);
        dataset.created = Utc::now() + Duration::seconds(self.created_offset_secs);
        dataset.access.set_user_level(self.owner.id, AccessLevel::Admin);
        world.store.insert_dataset(&dataset).await.expect("insert dataset");

        for index in 0..self.frames {
            let mut item = match self.dataset_type {
                DatasetType::LargeImage => Item::new(dataset.id, format!("tile_{index:04}.tiff"), None),
                _ => Item::new(dataset.id, format!("frame_{index:04}.png"), None),
            };
            item.large_image = self.dataset_type == DatasetType::LargeImage;
            item.creator_id = Some(self.owner.id);
            world.store.create_item(&item).await.expect("create item");

            let file = FileRecord {
                id: Uuid::new_v4(),
                item_id: item.id,
                name: item.name.clone(),
                size: 1024,
                mime_type: Some("image/png".to_string()),
                storage_key: format!("assetstore/{}", item.id),
                creator_id: Some(self.owner.id),
                created: Utc::now(),
            };
            world.store.add_file(&file).await.expect("add file");
        }
        dataset.size = (self.frames as u64) * 1024;
        world.store.save_dataset(&dataset).await.expect("save dataset");
        dataset
    }
}
