//! Access-request API routes
//!
//! - `PUT /api/v1/sharable-datasets/:id/request-access?exchangeDatasetId=` - Request access
//! - `PUT /api/v1/sharable-datasets/:id/grant-access?userId=&grant=&exchangeDatasetId=` - Grant or deny
//! - `GET /api/v1/sharable-datasets/:id/requested` - Request status of the caller

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::commands::{
    deny, grant, request, DenyAccessCommand, DenyAccessError, GrantAccessCommand, GrantAccessError,
    RequestAccessCommand, RequestAccessError,
};
use super::queries::{status, RequestStatusError, RequestStatusQuery};
use crate::api::response::{ApiResponse, ErrorResponse, MessageBody};
use crate::error::AppError;
use crate::features::shared::identity::acting_user;
use crate::features::shared::{AuthzError, DatasetValidationError};
use crate::features::SharingState;
use crate::store::StoreError;

pub fn access_request_routes() -> Router<SharingState> {
    Router::new()
        .route("/:id/request-access", put(request_access))
        .route("/:id/grant-access", put(grant_access))
        .route("/:id/requested", get(request_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantParams {
    user_id: Uuid,
    #[serde(default = "default_grant")]
    grant: bool,
    #[serde(default)]
    exchange_dataset_id: Option<Uuid>,
}

fn default_grant() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestParams {
    #[serde(default)]
    exchange_dataset_id: Option<Uuid>,
}

/// Request access to a shared dataset or its preview
///
/// `exchangeDatasetId` offers one of the caller's own shared datasets in
/// return, which lets the owner answer with an exchange.
///
/// # Response
///
/// - `200 OK` - `{ message }`, also for requests that changed nothing
/// - `400 Bad Request` - Not a dataset, or the offered dataset is not shared
/// - `403 Forbidden` - The caller does not own the offered dataset
/// - `404 Not Found` - Unknown dataset
#[tracing::instrument(skip(state, headers))]
async fn request_access(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<RequestParams>,
) -> Result<Response, AccessApiError> {
    let user = acting_user(&state, &headers).await?;
    let command = RequestAccessCommand {
        dataset_id: id,
        user,
        exchange_dataset_id: params.exchange_dataset_id,
    };
    let outcome = request::handle(state, command).await?;
    Ok(ApiResponse::success(MessageBody::new(outcome.message())).into_response())
}

/// Grant (`grant=true`) or deny (`grant=false`) a pending request
///
/// With `exchangeDatasetId` the grant is mutual: the caller also receives
/// READ on the source of the requester's preview.
///
/// # Response
///
/// - `200 OK` - `{ message, id }` with the preview id
/// - `400 Bad Request` - Not a shared dataset, or missing source
/// - `403 Forbidden` - An ownership check failed, or the requester did not
///   offer the exchanged dataset; nothing was changed
/// - `404 Not Found` - Unknown dataset or user
/// - `500 Internal Server Error` - Grant partially applied; re-invoke to finish
#[tracing::instrument(skip(state, headers))]
async fn grant_access(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<GrantParams>,
) -> Result<Response, AccessApiError> {
    let owner = acting_user(&state, &headers).await?;

    let body = if params.grant {
        let command = GrantAccessCommand {
            dataset_id: id,
            owner,
            requesting_user_id: params.user_id,
            exchange_dataset_id: params.exchange_dataset_id,
        };
        let outcome = grant::handle(state, command).await?;
        MessageBody::new(outcome.message()).with_id(outcome.preview_id)
    } else {
        let command = DenyAccessCommand {
            dataset_id: id,
            owner,
            requesting_user_id: params.user_id,
        };
        let outcome = deny::handle(state, command).await?;
        MessageBody::new(outcome.message()).with_id(outcome.preview_id)
    };
    Ok(ApiResponse::success(body).into_response())
}

/// Whether, and with what outcome, the caller asked for access
#[tracing::instrument(skip(state, headers))]
async fn request_status(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AccessApiError> {
    let user = acting_user(&state, &headers).await?;
    let response = status::handle(state, RequestStatusQuery { dataset_id: id, user }).await?;
    Ok(ApiResponse::success(response).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum AccessApiError {
    App(AppError),
    NotFound(String),
    Authz(AuthzError),
    NotOffered(String),
    Validation(DatasetValidationError),
    Partial { message: String, completed: usize, total: usize, failed_step: String },
    Store(StoreError),
}

impl From<AppError> for AccessApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<RequestAccessError> for AccessApiError {
    fn from(err: RequestAccessError) -> Self {
        match err {
            RequestAccessError::NotFound(_) => Self::NotFound(err.to_string()),
            RequestAccessError::Authz(e) => Self::Authz(e),
            RequestAccessError::Validation(e) => Self::Validation(e),
            RequestAccessError::Store(e) => Self::Store(e),
        }
    }
}

impl From<GrantAccessError> for AccessApiError {
    fn from(err: GrantAccessError) -> Self {
        match err {
            GrantAccessError::NotFound(_) | GrantAccessError::UserNotFound(_) => {
                Self::NotFound(err.to_string())
            },
            GrantAccessError::Authz(e) => Self::Authz(e),
            GrantAccessError::ExchangeNotOffered { .. } => Self::NotOffered(err.to_string()),
            GrantAccessError::Validation(e) => Self::Validation(e),
            GrantAccessError::PartialCompletion(e) => Self::Partial {
                message: e.to_string(),
                completed: e.completed,
                total: e.total,
                failed_step: e.failed_step,
            },
            GrantAccessError::Store(e) => Self::Store(e),
        }
    }
}

impl From<DenyAccessError> for AccessApiError {
    fn from(err: DenyAccessError) -> Self {
        match err {
            DenyAccessError::NotFound(_) | DenyAccessError::UserNotFound(_) => {
                Self::NotFound(err.to_string())
            },
            DenyAccessError::Authz(e) => Self::Authz(e),
            DenyAccessError::Validation(e) => Self::Validation(e),
            DenyAccessError::Store(e) => Self::Store(e),
        }
    }
}

impl From<RequestStatusError> for AccessApiError {
    fn from(err: RequestStatusError) -> Self {
        match err {
            RequestStatusError::NotFound(_) => Self::NotFound(err.to_string()),
            RequestStatusError::Store(e) => Self::Store(e),
        }
    }
}

impl IntoResponse for AccessApiError {
    fn into_response(self) -> Response {
        match self {
            AccessApiError::App(err) => err.into_response(),
            AccessApiError::NotFound(message) => {
                ErrorResponse::new("NOT_FOUND", message).into_response_with(StatusCode::NOT_FOUND)
            },
            AccessApiError::Authz(e) => {
                ErrorResponse::new("FORBIDDEN", e.to_string()).into_response_with(StatusCode::FORBIDDEN)
            },
            AccessApiError::NotOffered(message) => {
                ErrorResponse::new("EXCHANGE_NOT_OFFERED", message).into_response_with(StatusCode::FORBIDDEN)
            },
            AccessApiError::Validation(e) => {
                ErrorResponse::new("VALIDATION_ERROR", e.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            },
            AccessApiError::Partial {
                message,
                completed,
                total,
                failed_step,
            } => {
                tracing::error!("Grant partially applied: {}", message);
                ErrorResponse::with_details(
                    "PARTIAL_COMPLETION",
                    "Grant was only partially applied; grant again to finish",
                    json!({ "completed": completed, "total": total, "failedStep": failed_step }),
                )
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            },
            AccessApiError::Store(e) => {
                tracing::error!("Store error in access-request API: {}", e);
                ErrorResponse::new("INTERNAL_ERROR", "A storage error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            },
        }
    }
}
