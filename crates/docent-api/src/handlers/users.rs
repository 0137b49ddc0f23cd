//! Handlers behind the session guard
//!
//! Author: hephaex@gmail.com

use crate::auth::models::{IdentityView, ProtectedDataResponse, UserProfile};
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use std::sync::Arc;

/// Profile of the signed-in user
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
        (status = 404, description = "User no longer exists", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .auth
        .current_user(user.user_id)
        .await?
        .map(UserProfile::from)
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    Ok(Json(profile))
}

/// Sample resource that only needs the caller's identity
#[utoipa::path(
    get,
    path = "/api/protected/user-data",
    tag = "users",
    responses(
        (status = 200, description = "Protected data", body = ProtectedDataResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer" = []))
)]
pub async fn user_data_handler(Extension(user): Extension<AuthenticatedUser>) -> impl IntoResponse {
    Json(ProtectedDataResponse {
        message: "This is protected data".to_string(),
        user: IdentityView::from(&user),
    })
}

/// Chat landing page; protected like everything under `/chat`
pub async fn chat_handler(Extension(user): Extension<AuthenticatedUser>) -> impl IntoResponse {
    Json(ProtectedDataResponse {
        message: format!("Welcome to chat, {}", user.email),
        user: IdentityView::from(&user),
    })
}
