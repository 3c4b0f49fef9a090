//! Persistence collaborators
//!
//! The sharing core talks to storage only through the traits in this module:
//!
//! - [`DatasetStore`]: dataset (folder) documents, their embedded access
//!   structure and declarative list pipelines
//! - [`MediaStore`]: items, files and annotations inside a dataset
//! - [`UserDirectory`]: user lookup
//!
//! Two backends implement all three: [`MemoryStore`] and [`PgStore`].
//! Writes to the request list of a single dataset are atomic in both.

pub mod memory;
pub mod pipeline;
pub mod postgres;

use async_trait::async_trait;
use dsx_common::types::{
    AccessLevel, Annotation, Dataset, FileRecord, Item, RequestStatus, UpsertOutcome, User,
};
use serde_json::Value;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use pipeline::{Collection, Filter, Pipeline, SortDirection, Stage};
pub use postgres::PgStore;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by storage backends
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Dataset {0} not found")]
    DatasetNotFound(Uuid),

    #[error("Item {0} not found")]
    ItemNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Dataset documents and their access structure
#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn find_dataset(&self, id: Uuid) -> StoreResult<Option<Dataset>>;

    /// Child folder of `parent` with the given name
    async fn find_dataset_by_name(
        &self,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> StoreResult<Option<Dataset>>;

    async fn insert_dataset(&self, dataset: &Dataset) -> StoreResult<()>;

    /// Replace the stored document
    async fn save_dataset(&self, dataset: &Dataset) -> StoreResult<()>;

    /// Delete a dataset together with its child folders, items, files and
    /// annotations. Returns `false` when nothing was stored under `id`.
    async fn remove_dataset(&self, id: Uuid) -> StoreResult<bool>;

    /// Datasets whose `originalMediaId` is `source`, whether or not they were
    /// fully populated
    async fn find_previews_of(&self, source: Uuid) -> StoreResult<Vec<Dataset>>;

    /// Atomically replace `meta.sharableMediaId` of dataset `id`, leaving the
    /// rest of the stored document untouched. Returns the previous value.
    async fn set_sharable_media_id(&self, id: Uuid, preview: Option<Uuid>) -> StoreResult<Option<Uuid>>;

    /// Atomically write the request entry of `user` on dataset `id`.
    ///
    /// The existing entry is compared against `keep_if` inside the same
    /// atomic section as the write; see [`dsx_common::types::AccessList::upsert_request`].
    async fn upsert_access_request(
        &self,
        id: Uuid,
        user: Uuid,
        status: RequestStatus,
        keep_if: &[RequestStatus],
    ) -> StoreResult<UpsertOutcome>;

    /// Atomically replace the exchange offer on the request entry of `user`.
    /// Returns `false` when the user has no entry on dataset `id`.
    async fn set_request_offer(&self, id: Uuid, user: Uuid, offer: Option<Uuid>) -> StoreResult<bool>;

    /// Atomically set the ACL level of `user` on dataset `id`
    async fn set_user_access(&self, id: Uuid, user: Uuid, level: AccessLevel) -> StoreResult<()>;

    /// Run a pipeline over a collection
    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> StoreResult<Vec<Value>>;
}

/// Items, files and annotations
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Items of a folder in insertion order
    async fn list_items(&self, folder_id: Uuid) -> StoreResult<Vec<Item>>;

    async fn create_item(&self, item: &Item) -> StoreResult<()>;

    async fn add_file(&self, file: &FileRecord) -> StoreResult<()>;

    async fn list_files(&self, item_id: Uuid) -> StoreResult<Vec<FileRecord>>;

    /// Attach copies of every file of `from` to `to`, sharing stored content.
    /// Returns the number of files copied.
    async fn copy_files(&self, from: Uuid, to: Uuid) -> StoreResult<usize>;

    async fn add_annotation(&self, annotation: &Annotation) -> StoreResult<()>;

    async fn list_annotations(&self, dataset_id: Uuid) -> StoreResult<Vec<Annotation>>;

    /// Copy every track and group of `source` onto `dest`.
    /// Returns the number of records cloned.
    async fn clone_annotations(&self, source: Uuid, dest: Uuid) -> StoreResult<usize>;
}

/// User lookup
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;
}
