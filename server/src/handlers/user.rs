//! Account endpoints

use actix_web::{web, HttpResponse};

use crate::db::DbPool;
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::services::accounts::{self, RegisterRequest};

/// # Endpoint
/// POST /api/users
pub async fn register(
    pool: web::Data<DbPool>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = web::block(move || {
        let mut conn = pool.get()?;
        accounts::register(&mut conn, payload.into_inner())
    })
    .await??;

    Ok(HttpResponse::Created().json(user))
}

/// Ask to be granted broker capability
///
/// # Endpoint
/// POST /api/broker-requests
pub async fn request_broker(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let request = web::block(move || {
        let mut conn = pool.get()?;
        accounts::request_broker(&mut conn, &user)
    })
    .await??;

    Ok(HttpResponse::Created().json(request))
}
