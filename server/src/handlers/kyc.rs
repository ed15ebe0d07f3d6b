//! KYC endpoints for the caller's own participant

use actix_web::{web, HttpResponse};

use crate::db::DbPool;
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::services::kyc::{self, KycPayload};

/// # Endpoint
/// GET /api/kyc/me
pub async fn get_my_kyc(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let view = web::block(move || {
        let mut conn = pool.get()?;
        kyc::get_my_kyc(&mut conn, &user)
    })
    .await??;

    Ok(HttpResponse::Ok().json(view))
}

/// # Endpoint
/// PUT /api/kyc/me
pub async fn put_my_kyc(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: web::Json<KycPayload>,
) -> Result<HttpResponse, ApiError> {
    let view = web::block(move || {
        let mut conn = pool.get()?;
        kyc::put_my_kyc(&mut conn, &user, payload.into_inner())
    })
    .await??;

    Ok(HttpResponse::Ok().json(view))
}
