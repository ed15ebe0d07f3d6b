//! Escrow transaction endpoints

use actix_web::{web, HttpResponse};

use crate::db::DbPool;
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::services::escrow::{AcceptRequest, CreateEscrowRequest, EscrowLifecycle, InviteRequest};

/// Create a transaction
///
/// # Endpoint
/// POST /api/escrows
pub async fn create_escrow(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: web::Json<CreateEscrowRequest>,
) -> Result<HttpResponse, ApiError> {
    let view = web::block(move || {
        let mut conn = pool.get()?;
        EscrowLifecycle::new(&mut conn).create_transaction(&user, payload.into_inner())
    })
    .await??;

    Ok(HttpResponse::Created().json(view))
}

/// Transactions the caller created or takes part in
///
/// # Endpoint
/// GET /api/escrows
pub async fn list_escrows(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let views = web::block(move || {
        let mut conn = pool.get()?;
        EscrowLifecycle::new(&mut conn).list_transactions(&user)
    })
    .await??;

    Ok(HttpResponse::Ok().json(views))
}

/// # Endpoint
/// GET /api/escrows/{id}
pub async fn get_escrow(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let transaction_id = path.into_inner();
    let view = web::block(move || {
        let mut conn = pool.get()?;
        EscrowLifecycle::new(&mut conn).get_transaction(&transaction_id, &user)
    })
    .await??;

    Ok(HttpResponse::Ok().json(view))
}

/// Invite co-broker, buyer and seller
///
/// # Endpoint
/// POST /api/escrows/{id}/invite
pub async fn invite(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<String>,
    payload: web::Json<InviteRequest>,
) -> Result<HttpResponse, ApiError> {
    let transaction_id = path.into_inner();
    let view = web::block(move || {
        let mut conn = pool.get()?;
        EscrowLifecycle::new(&mut conn).invite(&transaction_id, &user, payload.into_inner())
    })
    .await??;

    Ok(HttpResponse::Ok().json(view))
}

/// Accept participation. The body is optional; an empty body matches the
/// participant by the caller's own email.
///
/// # Endpoint
/// POST /api/escrows/{id}/accept
pub async fn accept(
    pool: web::Data<DbPool>,
    AuthenticatedUser(user): AuthenticatedUser,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let request: AcceptRequest = if body.iter().all(u8::is_ascii_whitespace) {
        AcceptRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?
    };

    let transaction_id = path.into_inner();
    let view = web::block(move || {
        let mut conn = pool.get()?;
        EscrowLifecycle::new(&mut conn).accept(&transaction_id, &user, request)
    })
    .await??;

    Ok(HttpResponse::Ok().json(view))
}
