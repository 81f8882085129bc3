//! The HTTP boundary: routing, authentication, request validation, and the
//! translation of domain errors into status codes.

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{auth_cookie, CurrentUser, AUTH_COOKIE};
pub use error::ApiError;
pub use routes::{router, AppState};
