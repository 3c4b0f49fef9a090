//! PostgreSQL backend
//!
//! Documents are stored as JSONB next to a few scalar columns used for lookups
//! and cascading deletes. Request-list and ACL updates lock the dataset row
//! with `SELECT ... FOR UPDATE` inside a transaction.
//!
//! Pipelines are evaluated in process, so both backends share one
//! implementation of the list semantics. What gets loaded is narrowed first:
//! the scalar equalities of a leading `Match` become a SQL `WHERE` clause (see
//! [`Pushdown`]), and joined collections are fetched only for ids referenced
//! by the narrowed input.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dsx_common::types::{
    AccessLevel, Annotation, Dataset, FileRecord, Item, RequestStatus, UpsertOutcome, User,
};
use serde_json::{Map, Value};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use super::pipeline::{Collection, Filter, Pipeline, Snapshot, Stage};
use super::{DatasetStore, MediaStore, StoreError, StoreResult, UserDirectory};

/// Backend on a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Register or update a user
    pub async fn add_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, login, admin)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET login = EXCLUDED.login, admin = EXCLUDED.admin
            "#,
        )
        .bind(user.id)
        .bind(&user.login)
        .bind(user.admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn lock_folder(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<Dataset> {
        let body: Option<Json<Dataset>> =
            sqlx::query_scalar("SELECT body FROM folders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        body.map(|Json(dataset)| dataset)
            .ok_or(StoreError::DatasetNotFound(id))
    }

    async fn write_folder(
        tx: &mut Transaction<'_, Postgres>,
        dataset: &Dataset,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE folders SET body = $2 WHERE id = $1")
            .bind(dataset.id)
            .bind(Json(dataset))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Folder rows matching `pushdown`, in `created, id` order
    async fn load_folders(&self, pushdown: &Pushdown) -> StoreResult<Vec<FolderRow>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT id, created, body FROM folders WHERE TRUE");
        pushdown.push_conditions(&mut query);
        query.push(" ORDER BY created, id");
        let rows = query.build_query_as::<FolderRow>().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    async fn load_folders_by_id(&self, ids: &[Uuid]) -> StoreResult<Vec<FolderRow>> {
        let rows = sqlx::query_as("SELECT id, created, body FROM folders WHERE id = ANY($1) ORDER BY created, id")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Users as documents; all of them, or only those in `ids`
    async fn load_users(&self, ids: Option<&[Uuid]>) -> StoreResult<Vec<Value>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT id, login, admin FROM users");
        if let Some(ids) = ids {
            query.push(" WHERE id = ANY(").push_bind(ids.to_vec()).push(")");
        }
        query.push(" ORDER BY login");
        let rows: Vec<(Uuid, String, bool)> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(id, login, admin)| serde_json::to_value(User { id, login, admin }).map_err(StoreError::from))
            .collect()
    }
}

type FolderRow = (Uuid, DateTime<Utc>, Json<Value>);

fn folder_bodies(rows: Vec<FolderRow>) -> Vec<Value> {
    rows.into_iter().map(|(_, _, Json(body))| body).collect()
}

/// Folder paths known to hold scalars, so JSONB containment on them means
/// the same as the in-process `Eq`
const SCALAR_PATHS: &[&str] = &["meta.annotate", "meta.sharable", "meta.type", "public"];

/// The part of a leading `Match` that SQL can evaluate.
///
/// Only conjuncts are taken, so the rows loaded are always a superset of the
/// rows the filter keeps. The full filter still runs in process afterwards.
#[derive(Debug, Default, PartialEq)]
struct Pushdown {
    creator_id: Option<Uuid>,
    contains: Map<String, Value>,
}

impl Pushdown {
    fn from_pipeline(pipeline: &Pipeline) -> Self {
        let mut pushdown = Self::default();
        if let Some(Stage::Match(filter)) = pipeline.stages.first() {
            pushdown.add(filter);
        }
        pushdown
    }

    fn add(&mut self, filter: &Filter) {
        match filter {
            Filter::And(filters) => filters.iter().for_each(|f| self.add(f)),
            Filter::Eq(path, Value::String(id)) if path == "creatorId" && self.creator_id.is_none() => {
                self.creator_id = Uuid::parse_str(id).ok();
            },
            Filter::Eq(path, value) if SCALAR_PATHS.contains(&path.as_str()) && is_scalar(value) => {
                insert_path(&mut self.contains, path, value.clone());
            },
            _ => {},
        }
    }

    fn is_empty(&self) -> bool {
        self.creator_id.is_none() && self.contains.is_empty()
    }

    fn push_conditions(&self, query: &mut QueryBuilder<'_, Postgres>) {
        if let Some(creator_id) = self.creator_id {
            query.push(" AND creator_id = ").push_bind(creator_id);
        }
        if !self.contains.is_empty() {
            query
                .push(" AND body @> ")
                .push_bind(Json(Value::Object(self.contains.clone())));
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        },
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        },
    }
}

/// Every id-shaped string anywhere in `docs`
fn referenced_ids<'a>(docs: impl IntoIterator<Item = &'a Value>) -> Vec<Uuid> {
    fn walk(value: &Value, found: &mut BTreeSet<Uuid>) {
        match value {
            Value::String(s) => {
                if let Ok(id) = Uuid::parse_str(s) {
                    found.insert(id);
                }
            },
            Value::Array(items) => items.iter().for_each(|v| walk(v, found)),
            Value::Object(fields) => fields.values().for_each(|v| walk(v, found)),
            _ => {},
        }
    }

    let mut found = BTreeSet::new();
    docs.into_iter().for_each(|doc| walk(doc, &mut found));
    found.into_iter().collect()
}

#[async_trait]
impl DatasetStore for PgStore {
    async fn find_dataset(&self, id: Uuid) -> StoreResult<Option<Dataset>> {
        let body: Option<Json<Dataset>> = sqlx::query_scalar("SELECT body FROM folders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(body.map(|Json(d)| d))
    }

    async fn find_dataset_by_name(
        &self,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> StoreResult<Option<Dataset>> {
        let body: Option<Json<Dataset>> = sqlx::query_scalar(
            r#"
            SELECT body FROM folders
            WHERE parent_id IS NOT DISTINCT FROM $1 AND name = $2
            ORDER BY created
            LIMIT 1
            "#,
        )
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(body.map(|Json(d)| d))
    }

    async fn insert_dataset(&self, dataset: &Dataset) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO folders (id, parent_id, name, creator_id, created, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(dataset.id)
        .bind(dataset.parent_id)
        .bind(&dataset.name)
        .bind(dataset.creator_id)
        .bind(dataset.created)
        .bind(Json(dataset))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_dataset(&self, dataset: &Dataset) -> StoreResult<()> {
        let mut stored = dataset.clone();
        stored.updated = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE folders
            SET parent_id = $2, name = $3, creator_id = $4, body = $5
            WHERE id = $1
            "#,
        )
        .bind(stored.id)
        .bind(stored.parent_id)
        .bind(&stored.name)
        .bind(stored.creator_id)
        .bind(Json(&stored))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::DatasetNotFound(dataset.id));
        }
        Ok(())
    }

    async fn remove_dataset(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_previews_of(&self, source: Uuid) -> StoreResult<Vec<Dataset>> {
        let rows: Vec<Json<Dataset>> = sqlx::query_scalar(
            "SELECT body FROM folders WHERE body ->> 'originalMediaId' = $1 ORDER BY created, id",
        )
        .bind(source.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(d)| d).collect())
    }

    async fn set_sharable_media_id(&self, id: Uuid, preview: Option<Uuid>) -> StoreResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;
        let mut dataset = Self::lock_folder(&mut tx, id).await?;
        let previous = std::mem::replace(&mut dataset.meta.sharable_media_id, preview);
        dataset.touch();
        Self::write_folder(&mut tx, &dataset).await?;
        tx.commit().await?;
        Ok(previous)
    }

    async fn upsert_access_request(
        &self,
        id: Uuid,
        user: Uuid,
        status: RequestStatus,
        keep_if: &[RequestStatus],
    ) -> StoreResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut dataset = Self::lock_folder(&mut tx, id).await?;
        let outcome = dataset.access.upsert_request(user, status, keep_if);
        if outcome.applied() {
            dataset.touch();
            Self::write_folder(&mut tx, &dataset).await?;
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn set_request_offer(&self, id: Uuid, user: Uuid, offer: Option<Uuid>) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let mut dataset = Self::lock_folder(&mut tx, id).await?;
        let found = dataset.access.set_offer(user, offer);
        if found {
            dataset.touch();
            Self::write_folder(&mut tx, &dataset).await?;
        }
        tx.commit().await?;
        Ok(found)
    }

    async fn set_user_access(&self, id: Uuid, user: Uuid, level: AccessLevel) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let mut dataset = Self::lock_folder(&mut tx, id).await?;
        dataset.access.set_user_level(user, level);
        dataset.touch();
        Self::write_folder(&mut tx, &dataset).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn aggregate(&self, collection: Collection, pipeline: &Pipeline) -> StoreResult<Vec<Value>> {
        let lookups = pipeline.lookup_collections();
        let mut snapshot = Snapshot::default();

        match collection {
            Collection::Users => {
                let users = self.load_users(None).await?;
                if lookups.contains(&Collection::Folders) {
                    let ids = referenced_ids(&users);
                    let folders = self.load_folders_by_id(&ids).await?;
                    snapshot.insert(Collection::Folders, folder_bodies(folders));
                }
                snapshot.insert(Collection::Users, users);
            },
            Collection::Folders => {
                let pushdown = Pushdown::from_pipeline(pipeline);
                let mut folders = self.load_folders(&pushdown).await?;
                tracing::debug!(rows = folders.len(), pushed_down = !pushdown.is_empty(), "Loaded pipeline input");

                if !lookups.is_empty() {
                    let ids = referenced_ids(folders.iter().map(|(_, _, Json(body))| body));
                    if lookups.contains(&Collection::Users) {
                        snapshot.insert(Collection::Users, self.load_users(Some(&ids)).await?);
                    }
                    if lookups.contains(&Collection::Folders) {
                        // Joined folders share the input slot; the leading
                        // Match drops them again in process
                        let seen: HashSet<Uuid> = folders.iter().map(|(id, _, _)| *id).collect();
                        let joined = self.load_folders_by_id(&ids).await?;
                        folders.extend(joined.into_iter().filter(|(id, _, _)| !seen.contains(id)));
                        folders.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
                    }
                }
                snapshot.insert(Collection::Folders, folder_bodies(folders));
            },
        }

        Ok(snapshot.aggregate(collection, pipeline))
    }
}

#[async_trait]
impl MediaStore for PgStore {
    async fn list_items(&self, folder_id: Uuid) -> StoreResult<Vec<Item>> {
        let rows: Vec<Json<Item>> =
            sqlx::query_scalar("SELECT body FROM items WHERE folder_id = $1 ORDER BY seq")
                .bind(folder_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|Json(i)| i).collect())
    }

    async fn create_item(&self, item: &Item) -> StoreResult<()> {
        sqlx::query("INSERT INTO items (id, folder_id, name, body) VALUES ($1, $2, $3, $4)")
            .bind(item.id)
            .bind(item.folder_id)
            .bind(&item.name)
            .bind(Json(item))
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    StoreError::DatasetNotFound(item.folder_id)
                },
                other => StoreError::Database(other),
            })?;
        Ok(())
    }

    async fn add_file(&self, file: &FileRecord) -> StoreResult<()> {
        sqlx::query("INSERT INTO files (id, item_id, body) VALUES ($1, $2, $3)")
            .bind(file.id)
            .bind(file.item_id)
            .bind(Json(file))
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    StoreError::ItemNotFound(file.item_id)
                },
                other => StoreError::Database(other),
            })?;
        Ok(())
    }

    async fn list_files(&self, item_id: Uuid) -> StoreResult<Vec<FileRecord>> {
        let rows: Vec<Json<FileRecord>> =
            sqlx::query_scalar("SELECT body FROM files WHERE item_id = $1 ORDER BY seq")
                .bind(item_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|Json(f)| f).collect())
    }

    async fn copy_files(&self, from: Uuid, to: Uuid) -> StoreResult<usize> {
        let mut copied = 0;
        let now: DateTime<Utc> = Utc::now();
        for file in self.list_files(from).await? {
            let copy = FileRecord {
                id: Uuid::new_v4(),
                item_id: to,
                created: now,
                ..file
            };
            self.add_file(&copy).await?;
            copied += 1;
        }
        Ok(copied)
    }

    async fn add_annotation(&self, annotation: &Annotation) -> StoreResult<()> {
        sqlx::query("INSERT INTO annotations (id, dataset_id, kind, body) VALUES ($1, $2, $3, $4)")
            .bind(annotation.id)
            .bind(annotation.dataset_id)
            .bind(annotation.kind.as_str())
            .bind(Json(annotation))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_annotations(&self, dataset_id: Uuid) -> StoreResult<Vec<Annotation>> {
        let rows: Vec<Json<Annotation>> =
            sqlx::query_scalar("SELECT body FROM annotations WHERE dataset_id = $1 ORDER BY seq")
                .bind(dataset_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|Json(a)| a).collect())
    }

    async fn clone_annotations(&self, source: Uuid, dest: Uuid) -> StoreResult<usize> {
        let mut cloned = 0;
        for annotation in self.list_annotations(source).await? {
            let copy = Annotation {
                id: Uuid::new_v4(),
                dataset_id: dest,
                ..annotation
            };
            self.add_annotation(&copy).await?;
            cloned += 1;
        }
        Ok(cloned)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row: Option<(Uuid, String, bool)> =
            sqlx::query_as("SELECT id, login, admin FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, login, admin)| User { id, login, admin }))
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let row: Option<(Uuid, String, bool)> =
            sqlx::query_as("SELECT id, login, admin FROM users WHERE login = $1")
                .bind(login)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, login, admin)| User { id, login, admin }))
    }
}
