//! List-view API routes
//!
//! - `GET /api/v1/sharable-datasets` - Sharable datasets visible to the caller
//! - `GET /api/v1/sharable-datasets/requests` - Pending requests against the caller's previews
//! - `GET /api/v1/sharable-datasets/requested` - Pending requests through the caller's datasets
//!
//! All three accept `limit`, `offset`, `sort` and `sortDir`, and report the
//! total match count in the `X-Total-Count` header.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::queries::{
    requested, requests, sharable, ListDatasetRequestsQuery, ListRequestedDatasetsQuery,
    ListSharableDatasetsQuery, ListingError, ListingParams,
};
use crate::api::response::{ApiResponse, ErrorResponse};
use crate::error::AppError;
use crate::features::shared::identity::acting_user;
use crate::features::shared::Paginated;
use crate::features::SharingState;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

pub fn listings_routes() -> Router<SharingState> {
    Router::new()
        .route("/", get(list_sharable_datasets))
        .route("/requests", get(list_dataset_requests))
        .route("/requested", get(list_requested_datasets))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharableListParams {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
    #[serde(default)]
    exclude_granted: Option<bool>,
}

fn page_response<T: Serialize>(page: Paginated<T>) -> Response {
    let total = page.pagination.total;
    let meta = json!({ "pagination": page.pagination });
    let mut response = (StatusCode::OK, Json(ApiResponse::success_with_meta(page.items, meta))).into_response();
    response.headers_mut().insert(
        HeaderName::from_static(TOTAL_COUNT_HEADER),
        HeaderValue::from(total),
    );
    response
}

/// List sharable previews of other users' datasets
///
/// `excludeGranted` (default `true`) hides previews the caller was granted.
#[tracing::instrument(skip(state, headers))]
async fn list_sharable_datasets(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Query(params): Query<SharableListParams>,
) -> Result<Response, ListingApiError> {
    let user = acting_user(&state, &headers).await?;
    let query = ListSharableDatasetsQuery {
        user,
        params: ListingParams {
            limit: params.limit,
            offset: params.offset,
            sort: params.sort,
            sort_dir: params.sort_dir,
        },
        exclude_granted: params.exclude_granted.unwrap_or(true),
    };

    let page = sharable::handle(state, query).await?;
    tracing::debug!(count = page.items.len(), total = page.pagination.total, "Sharable datasets listed via API");
    Ok(page_response(page))
}

/// List pending requests against the caller's previews
#[tracing::instrument(skip(state, headers))]
async fn list_dataset_requests(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Query(params): Query<ListingParams>,
) -> Result<Response, ListingApiError> {
    let user = acting_user(&state, &headers).await?;
    let page = requests::handle(state, ListDatasetRequestsQuery { user, params }).await?;
    Ok(page_response(page))
}

/// List pending requests on the previews of the caller's datasets
#[tracing::instrument(skip(state, headers))]
async fn list_requested_datasets(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Query(params): Query<ListingParams>,
) -> Result<Response, ListingApiError> {
    let user = acting_user(&state, &headers).await?;
    let page = requested::handle(state, ListRequestedDatasetsQuery { user, params }).await?;
    Ok(page_response(page))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum ListingApiError {
    App(AppError),
    Listing(ListingError),
}

impl From<AppError> for ListingApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<ListingError> for ListingApiError {
    fn from(err: ListingError) -> Self {
        Self::Listing(err)
    }
}

impl IntoResponse for ListingApiError {
    fn into_response(self) -> Response {
        match self {
            ListingApiError::App(err) => err.into_response(),
            ListingApiError::Listing(ListingError::Pagination(e)) => {
                ErrorResponse::new("VALIDATION_ERROR", e.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            },
            ListingApiError::Listing(ListingError::Store(e)) => {
                tracing::error!("Store error in listing API: {}", e);
                ErrorResponse::new("INTERNAL_ERROR", "A storage error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::identity::USER_ID_HEADER;
    use crate::features::shared::test_helpers::{TestDataset, TestWorld};
    use crate::store::DatasetStore;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn get_json(world: &TestWorld, uri: &str, user: Uuid) -> (StatusCode, HeaderMap, serde_json::Value) {
        let app = listings_routes().with_state(world.state.clone());
        let request = Request::builder()
            .uri(uri)
            .header(USER_ID_HEADER, user.to_string())
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_list_route_sets_total_header() {
        let world = TestWorld::new();
        let alice = world.user("alice").await;
        let bob = world.user("bob").await;
        for name in ["a", "b", "c"] {
            let mut preview = TestDataset::new(&alice, name).with_frames(0).insert(&world).await;
            preview.meta.sharable = true;
            world.store.save_dataset(&preview).await.unwrap();
        }

        let (status, headers, body) = get_json(&world, "/?limit=2&sort=name&sortDir=asc", bob.id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(TOTAL_COUNT_HEADER).unwrap(), "3");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][0]["name"], "a");
        assert_eq!(body["data"][0]["ownerLogin"], "alice");
        assert_eq!(body["meta"]["pagination"]["total"], 3);
        assert_eq!(body["meta"]["pagination"]["has_next"], true);
    }

    #[tokio::test]
    async fn test_list_route_rejects_bad_paging() {
        let world = TestWorld::new();
        let bob = world.user("bob").await;

        let (status, _, body) = get_json(&world, "/requests?limit=5000", bob.id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _, _) = get_json(&world, "/requested?sort=access", bob.id).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, headers, _) = get_json(&world, "/requested", bob.id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(TOTAL_COUNT_HEADER).unwrap(), "0");
    }
}
