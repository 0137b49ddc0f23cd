//! Docent API - session and authentication service
//!
//! Provides HTTP endpoints for registration, login, token refresh and
//! logout, and a session guard in front of every protected route.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod sweeper;
pub mod telemetry;

use crate::auth::cookies::{REFRESH_TOKEN_HEADER, RENEWED_ACCESS_HEADER};
use crate::handlers::{health, users};
use crate::state::AppState;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::auth::session_handler,
        handlers::auth::verify_get_handler,
        handlers::auth::verify_post_handler,
        handlers::users::me_handler,
        handlers::users::user_data_handler,
    ),
    components(schemas(
        error::ApiError,
        auth::models::RegisterRequest,
        auth::models::RegisterResponse,
        auth::models::LoginRequest,
        auth::models::TokenResponse,
        auth::models::RefreshRequest,
        auth::models::LogoutRequest,
        auth::models::LogoutResponse,
        auth::models::SessionResponse,
        auth::models::VerifyRequest,
        auth::models::VerifyResponse,
        auth::models::ClaimsView,
        auth::models::UserProfile,
        auth::models::IdentityView,
        auth::models::ProtectedDataResponse,
        handlers::health::HealthResponse,
        handlers::health::ReadinessResponse,
        handlers::health::ReadinessChecks,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and session tokens"),
        (name = "users", description = "Endpoints behind the session guard"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REFRESH_TOKEN_HEADER),
        ])
        .expose_headers([HeaderName::from_static(RENEWED_ACCESS_HEADER)]);

    if origins.is_empty() {
        layer
    } else {
        layer.allow_origin(origins).allow_credentials(true)
    }
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    metrics::register_metrics();

    let cors = cors_layer(&state.config.server.cors_origins);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs.max(1));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::prometheus_metrics))
        .route("/chat", get(users::chat_handler))
        .nest("/api", routes::api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::session_guard,
        ))
        .layer(axum_middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
