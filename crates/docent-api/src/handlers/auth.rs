//! Authentication API handlers
//!
//! Login and refresh return tokens in the JSON body and also set them as
//! HttpOnly cookies. Refresh, logout and session lookup take the refresh
//! token from the body, falling back to the refresh cookie.
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, AuditEvent, RequestOrigin};
use crate::auth::models::{
    ClaimsView, LoginRequest, LogoutRequest, LogoutResponse, RefreshRequest, RegisterRequest,
    RegisterResponse, SessionResponse, TokenResponse, VerifyRequest, VerifyResponse,
};
use crate::auth::{AccessVerdict, AuthError};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

const TOKEN_TYPE: &str = "Bearer";

/// Body value if present, else the refresh cookie or header
fn refresh_token_from(
    state: &AppState,
    headers: &HeaderMap,
    from_body: Option<String>,
) -> Option<String> {
    from_body
        .filter(|t| !t.trim().is_empty())
        .or_else(|| state.cookies.refresh_token(headers))
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    let origin = RequestOrigin::from_headers(&headers);

    match state
        .auth
        .register(&request.email, &request.display_name(), &request.secret)
        .await
    {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                email: user.email.clone(),
                origin,
            });
            Ok((
                StatusCode::CREATED,
                Json(RegisterResponse { user_id: user.id }),
            ))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email: request.email.clone(),
                reason: e.kind().to_string(),
                origin,
            });
            Err(e.into())
        }
    }
}

/// Login with email and secret
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let origin = RequestOrigin::from_headers(&headers);

    let (user, tokens) = match state.auth.login(&request.email, &request.secret).await {
        Ok(logged_in) => logged_in,
        Err(e) => {
            audit_log(&AuditEvent::LoginFailure {
                email: request.email.clone(),
                reason: e.kind().to_string(),
                origin,
            });
            return Err(e.into());
        }
    };

    audit_log(&AuditEvent::LoginSuccess {
        user_id: user.id,
        email: user.email.clone(),
        origin,
    });

    let mut response_headers = HeaderMap::new();
    state.cookies.set_tokens(
        &mut response_headers,
        &tokens.access.token,
        Some(&tokens.refresh.token),
    );

    Ok((
        response_headers,
        Json(TokenResponse {
            access_token: tokens.access.token,
            refresh_token: tokens.refresh.token,
            access_expires_in: tokens.access.expires_in,
            token_type: TOKEN_TYPE.to_string(),
        }),
    ))
}

/// Exchange a refresh token for new tokens
///
/// The presented refresh token is spent and a new one is returned.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = TokenResponse),
        (status = 401, description = "Refresh token is not live", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let presented = body.and_then(|Json(b)| b.refresh_token);
    let Some(token) = refresh_token_from(&state, &headers, presented) else {
        return Err(AuthError::MissingCredentials.into());
    };
    let origin = RequestOrigin::from_headers(&headers);

    let refreshed = match state.auth.refresh(&token).await {
        Ok(refreshed) => refreshed,
        Err(e @ AuthError::Revoked) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.kind().to_string(),
                origin,
            });
            let mut response = AppError::from(e).into_response();
            state.cookies.clear_all(response.headers_mut());
            return Ok(response);
        }
        Err(e) => return Err(e.into()),
    };

    audit_log(&AuditEvent::TokenRefresh {
        user_id: refreshed.refresh.user_id,
        origin,
    });

    let mut response_headers = HeaderMap::new();
    state.cookies.set_tokens(
        &mut response_headers,
        &refreshed.access.token,
        Some(&refreshed.refresh.token),
    );

    Ok((
        response_headers,
        Json(TokenResponse {
            access_token: refreshed.access.token,
            refresh_token: refreshed.refresh.token,
            access_expires_in: refreshed.access.expires_in,
            token_type: TOKEN_TYPE.to_string(),
        }),
    )
        .into_response())
}

/// Revoke a refresh token, or every session of its owner
///
/// Always `{ok: true}` unless storage fails. Access tokens already issued
/// stay valid until they expire.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = LogoutResponse),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let token = refresh_token_from(&state, &headers, request.refresh_token);

    let outcome = state
        .auth
        .logout(token.as_deref(), request.all_devices)
        .await?;

    audit_log(&AuditEvent::Logout {
        user_id: outcome.user_id,
        revoked: outcome.revoked,
        all_devices: request.all_devices,
        origin: RequestOrigin::from_headers(&headers),
    });

    let mut response_headers = HeaderMap::new();
    state.cookies.clear_all(&mut response_headers);

    Ok((
        response_headers,
        Json(LogoutResponse { ok: true }),
    ))
}

/// Resolve a refresh token to the user it belongs to
#[utoipa::path(
    post,
    path = "/api/auth/session",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session owner", body = SessionResponse),
        (status = 401, description = "Refresh token is not live", body = crate::error::ApiError),
    )
)]
pub async fn session_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let presented = body.and_then(|Json(b)| b.refresh_token);
    let token = refresh_token_from(&state, &headers, presented)
        .ok_or(AuthError::MissingCredentials)?;

    let user_id = state.auth.session_owner(&token).await?;
    Ok(Json(SessionResponse { user_id }))
}

/// Token from the request body, else the Authorization header or access cookie
fn verify_token(
    state: &AppState,
    headers: &HeaderMap,
    token: Option<String>,
) -> Result<Json<VerifyResponse>, AppError> {
    let token = token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| state.cookies.access_token(headers))
        .ok_or(AuthError::MissingCredentials)?;

    let failure = match state.auth.verify_access(&token) {
        AccessVerdict::Valid(claims) => {
            return Ok(Json(VerifyResponse {
                valid: true,
                claims: ClaimsView::from(claims),
            }));
        }
        AccessVerdict::Expired => AuthError::Expired,
        AccessVerdict::Malformed => AuthError::Malformed,
    };

    audit_log(&AuditEvent::InvalidToken {
        reason: failure.kind().to_string(),
        origin: RequestOrigin::from_headers(headers),
    });
    Err(failure.into())
}

/// Verify the access token in the Authorization header or access cookie
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "auth",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token expired or invalid", body = crate::error::ApiError),
    )
)]
pub async fn verify_get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    verify_token(&state, &headers, None)
}

/// Verify an access token passed in the body
#[utoipa::path(
    post,
    path = "/api/auth/verify",
    tag = "auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token expired or invalid", body = crate::error::ApiError),
    )
)]
pub async fn verify_post_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<VerifyRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let token = body.and_then(|Json(b)| b.access_token);
    verify_token(&state, &headers, token)
}
