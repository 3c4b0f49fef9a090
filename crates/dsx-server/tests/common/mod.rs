//! Shared fixtures for integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use dsx_common::types::{AccessLevel, Dataset, DatasetType, FileRecord, Item, User};
use dsx_server::{
    api,
    config::{Config, SharingSettings},
    features::{shared::identity::USER_ID_HEADER, SharingState},
    store::{DatasetStore, MediaStore, MemoryStore},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new(settings: SharingSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = SharingState::from_backend(store.clone(), settings);
        let router = api::create_router(state, &Config::default());
        Self { store, router }
    }

    pub async fn user(&self, login: &str) -> User {
        let user = User::new(login);
        self.store.add_user(user.clone()).await;
        user
    }

    /// Annotated image sequence owned by `owner`, one file per frame
    pub async fn image_sequence(&self, owner: &User, name: &str, frames: usize) -> Dataset {
        let mut dataset = Dataset::new(name, None, Some(owner.id));
        dataset.meta.annotate = true;
        dataset.meta.dataset_type = Some(DatasetType::ImageSequence);
        dataset.access.set_user_level(owner.id, AccessLevel::Admin);
        self.store.insert_dataset(&dataset).await.unwrap();

        for index in 0..frames {
            let item = Item::new(dataset.id, format!("frame_{index:04}.png"), Some(owner.id));
            self.store.create_item(&item).await.unwrap();
            let file = FileRecord {
                id: Uuid::new_v4(),
                item_id: item.id,
                name: item.name.clone(),
                size: 512,
                mime_type: Some("image/png".to_string()),
                storage_key: format!("assetstore/{}", item.id),
                creator_id: Some(owner.id),
                created: chrono::Utc::now(),
            };
            self.store.add_file(&file).await.unwrap();
        }
        dataset
    }

    pub async fn dataset(&self, id: Uuid) -> Dataset {
        self.store.find_dataset(id).await.unwrap().unwrap()
    }

    pub async fn send(&self, method: Method, uri: &str, user: &User) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, user.id.to_string())
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }
}
