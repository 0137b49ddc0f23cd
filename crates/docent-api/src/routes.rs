//! API route definitions
//!
//! Which of these need a session is decided by the route policy in the
//! session guard, not by how they are grouped here.
//!
//! Author: hephaex@gmail.com

use crate::handlers::{auth, users};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Routes mounted under `/api`
pub fn api_routes() -> Router<Arc<AppState>> {
    let auth_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/refresh", post(auth::refresh_handler))
        .route("/logout", post(auth::logout_handler))
        .route("/session", post(auth::session_handler))
        .route(
            "/verify",
            get(auth::verify_get_handler).post(auth::verify_post_handler),
        );

    let user_routes = Router::new()
        .route("/users/me", get(users::me_handler))
        .route("/protected/user-data", get(users::user_data_handler));

    Router::new().nest("/auth", auth_routes).merge(user_routes)
}
