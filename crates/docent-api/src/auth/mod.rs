//! Session and authentication subsystem
//!
//! - `credentials`: registration and secret verification (Argon2id)
//! - `issuer` / `jwt`: signed access tokens, verified without storage
//! - `ledger`: opaque refresh tokens recorded by digest
//! - `renewal`: what to do with whatever credentials a request carried
//! - `middleware`: the session guard in front of protected routes
//! - `revocation`: logout
//! - `service`: the above wired together once at startup

pub mod cookies;
pub mod credentials;
pub mod error;
pub mod issuer;
pub mod jwt;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod password;
pub mod policy;
pub mod renewal;
pub mod retry;
pub mod revocation;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AuthError;
pub use jwt::{AccessVerdict, Claims, JwtConfig};
pub use middleware::{session_guard, AuthenticatedUser};
pub use policy::{Access, RoutePolicy};
pub use renewal::{PresentedCredentials, RenewalOutcome};
pub use service::AuthService;
