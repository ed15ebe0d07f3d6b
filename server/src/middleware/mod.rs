//! Request middleware

pub mod auth;

pub use auth::{AuthenticatedUser, RequireAuth, USER_ID_HEADER};
