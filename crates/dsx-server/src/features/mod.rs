//! Feature modules implementing the DSX API
//!
//! Each feature is a vertical slice with its own commands, queries and routes:
//!
//! - **sharing**: sharable preview derivation and preview media
//! - **access_requests**: request, grant (simple or exchange), deny and status
//! - **listings**: paginated list views over datasets and their requests
//! - **shared**: validation, authorization, pagination and media helpers
//!
//! Commands and queries implement the mediator pattern using the `mediator`
//! crate; every handler is an `async fn handle(state, request)`.

pub mod access_requests;
pub mod listings;
pub mod shared;
pub mod sharing;

use axum::Router;
use std::sync::Arc;

use crate::config::SharingSettings;
use crate::events::{NotificationSink, TracingNotifier};
use crate::store::{DatasetStore, MediaStore, UserDirectory};

/// Shared state for all feature routes and handlers
#[derive(Clone)]
pub struct SharingState {
    pub datasets: Arc<dyn DatasetStore>,
    pub media: Arc<dyn MediaStore>,
    pub users: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn NotificationSink>,
    pub settings: SharingSettings,
}

impl SharingState {
    /// State over one backend implementing every store trait
    pub fn from_backend<S>(backend: Arc<S>, settings: SharingSettings) -> Self
    where
        S: DatasetStore + MediaStore + UserDirectory + 'static,
    {
        Self {
            datasets: backend.clone(),
            media: backend.clone(),
            users: backend,
            notifier: Arc::new(TracingNotifier),
            settings,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Creates the API router with all feature routes mounted
///
/// Everything lives under `/sharable-datasets`.
pub fn router(state: SharingState) -> Router<()> {
    let sharable = Router::new()
        .merge(listings::listings_routes())
        .merge(sharing::sharing_routes())
        .merge(access_requests::access_request_routes())
        .with_state(state);

    Router::new().nest("/sharable-datasets", sharable)
}
