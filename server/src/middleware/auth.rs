//! Caller identity
//!
//! A trusted gateway in front of the server authenticates the user and
//! forwards their id in the `X-User-Id` header. `RequireAuth` loads that user
//! and attaches it to the request; handlers read it back through the
//! `AuthenticatedUser` extractor.

use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::db::DbPool;
use crate::error::{ApiError, EscrowError};
use crate::logging::sanitize::sanitize_id;
use crate::models::user::User;

pub const USER_ID_HEADER: &str = "X-User-Id";

/// Middleware that requires a known caller
///
/// # Behavior
/// 1. Reads the user id from `X-User-Id`
/// 2. Loads the user from the database
/// 3. Attaches the user to request extensions
/// 4. Returns 401 Unauthorized if the header is missing, malformed or
///    refers to no user
pub struct RequireAuth;

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAuthMiddleware<S> {
    service: Rc<S>,
}

fn header_user_id(req: &ServiceRequest) -> Result<String, ApiError> {
    let raw = req
        .headers()
        .get(USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid user id header".to_string()))?;

    uuid::Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| ApiError::Unauthorized("Invalid user id header".to_string()))
}

impl<S, B> Service<ServiceRequest> for RequireAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();

        Box::pin(async move {
            let user_id = header_user_id(&req)?;

            let pool = req
                .app_data::<web::Data<DbPool>>()
                .ok_or_else(|| {
                    warn!("Database pool not found in app data");
                    ApiError::Internal("Internal server error".to_string())
                })?
                .clone();

            let lookup_id = user_id.clone();
            let user = web::block(move || {
                let mut conn = pool.get()?;
                User::find_by_id(&mut conn, &lookup_id)
            })
            .await
            .map_err(ApiError::from)?
            .map_err(|e| match e {
                EscrowError::NotFound(_) => {
                    warn!(user_id = %sanitize_id(&user_id), "Header refers to non-existent user");
                    ApiError::Unauthorized("Unknown user".to_string())
                }
                other => ApiError::from(other),
            })?;

            req.extensions_mut().insert(user);
            svc.call(req).await
        })
    }
}

/// The caller attached by `RequireAuth`
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<User>()
                .cloned()
                .map(AuthenticatedUser)
                .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string())),
        )
    }
}
