//! Sharing API routes
//!
//! - `POST /api/v1/sharable-datasets/:id/share?share=bool` - Create or remove a preview
//! - `GET /api/v1/sharable-datasets/:id/media` - Media of a preview

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::commands::{share, ShareDatasetCommand, ShareDatasetError};
use super::queries::{media, PreviewMediaError, PreviewMediaQuery};
use crate::api::response::{ApiResponse, ErrorResponse, MessageBody};
use crate::error::AppError;
use crate::features::shared::identity::acting_user;
use crate::features::SharingState;

pub fn sharing_routes() -> Router<SharingState> {
    Router::new()
        .route("/:id/share", post(share_dataset))
        .route("/:id/media", get(preview_media))
}

#[derive(Debug, Deserialize)]
struct ShareParams {
    #[serde(default = "default_share")]
    share: bool,
}

fn default_share() -> bool {
    true
}

/// Create (`share=true`) or remove (`share=false`) the sharable preview
///
/// # Response
///
/// - `200 OK` - `{ message, id? }`; `id` is the new preview when one was created
/// - `400 Bad Request` - Not a dataset
/// - `403 Forbidden` - Caller lacks ADMIN on the dataset
/// - `404 Not Found` - Unknown dataset
/// - `500 Internal Server Error` - Store error or partially created preview
#[tracing::instrument(skip(state, headers))]
async fn share_dataset(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<ShareParams>,
) -> Result<Response, SharingApiError> {
    let user = acting_user(&state, &headers).await?;
    let command = ShareDatasetCommand {
        dataset_id: id,
        user,
        share: params.share,
    };

    let outcome = share::handle(state, command).await?;
    let mut body = MessageBody::new(outcome.message());
    if let Some(preview_id) = outcome.preview_id() {
        body = body.with_id(preview_id);
    }
    Ok(ApiResponse::success(body).into_response())
}

/// Media of a sharable preview
#[tracing::instrument(skip(state, headers))]
async fn preview_media(
    State(state): State<SharingState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, SharingApiError> {
    let user = acting_user(&state, &headers).await?;
    let response = media::handle(state, PreviewMediaQuery { dataset_id: id, user }).await?;

    tracing::debug!(count = response.image_data.len(), "Preview media listed via API");
    Ok(ApiResponse::success(response).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum SharingApiError {
    App(AppError),
    Share(ShareDatasetError),
    Media(PreviewMediaError),
}

impl From<AppError> for SharingApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<ShareDatasetError> for SharingApiError {
    fn from(err: ShareDatasetError) -> Self {
        Self::Share(err)
    }
}

impl From<PreviewMediaError> for SharingApiError {
    fn from(err: PreviewMediaError) -> Self {
        Self::Media(err)
    }
}

impl IntoResponse for SharingApiError {
    fn into_response(self) -> Response {
        match self {
            SharingApiError::App(err) => err.into_response(),

            SharingApiError::Share(ShareDatasetError::NotFound(id))
            | SharingApiError::Media(PreviewMediaError::NotFound(id)) => {
                ErrorResponse::new("NOT_FOUND", format!("Dataset {id} not found"))
                    .into_response_with(StatusCode::NOT_FOUND)
            },

            SharingApiError::Share(ShareDatasetError::Authz(e))
            | SharingApiError::Media(PreviewMediaError::Authz(e)) => {
                ErrorResponse::new("FORBIDDEN", e.to_string()).into_response_with(StatusCode::FORBIDDEN)
            },

            SharingApiError::Share(ShareDatasetError::Validation(e))
            | SharingApiError::Media(PreviewMediaError::Validation(e)) => {
                ErrorResponse::new("VALIDATION_ERROR", e.to_string())
                    .into_response_with(StatusCode::BAD_REQUEST)
            },

            SharingApiError::Share(ShareDatasetError::PartialCompletion { preview_id, source }) => {
                tracing::error!(%preview_id, error = %source, "Sharable dataset partially created");
                ErrorResponse::with_details(
                    "PARTIAL_COMPLETION",
                    "Sharable dataset was only partially created; share again to recreate it",
                    json!({ "previewId": preview_id }),
                )
                .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            },

            SharingApiError::Share(ShareDatasetError::Store(e))
            | SharingApiError::Media(PreviewMediaError::Store(e)) => {
                tracing::error!("Store error in sharing API: {}", e);
                ErrorResponse::new("INTERNAL_ERROR", "A storage error occurred")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            },
        }
    }
}
