//! Acting-user resolution
//!
//! Authentication happens upstream; requests carry the authenticated user's
//! id in the `x-user-id` header.

use axum::http::HeaderMap;
use dsx_common::types::User;
use uuid::Uuid;

use crate::error::AppError;
use crate::features::SharingState;

/// Header carrying the acting user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Look up the user named by the `x-user-id` header
pub async fn acting_user(state: &SharingState, headers: &HeaderMap) -> Result<User, AppError> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized("Missing or malformed x-user-id header".to_string()))?;

    state
        .users
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("Unknown user {id}")))
}
