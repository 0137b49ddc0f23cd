//! Cross-cutting HTTP middleware
//!
//! The session guard lives with the rest of the auth code in
//! `crate::auth::middleware`.
//!
//! Author: hephaex@gmail.com

pub mod metrics;
pub mod security_headers;

pub use metrics::metrics_middleware;
pub use security_headers::security_headers_middleware;
