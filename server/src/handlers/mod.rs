//! HTTP handlers and route table

pub mod escrow;
pub mod health;
pub mod kyc;
pub mod user;

use actix_web::web;

use crate::error::ApiError;
use crate::middleware::RequireAuth;

/// JSON extractor config returning `{"error": ...}` bodies on bad payloads
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

/// Register every route on an `App`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .service(health::health_check)
        .service(web::resource("/api/users").route(web::post().to(user::register)))
        .service(
            web::scope("/api/broker-requests")
                .wrap(RequireAuth)
                .route("", web::post().to(user::request_broker)),
        )
        .service(
            web::scope("/api/escrows")
                .wrap(RequireAuth)
                .route("", web::post().to(escrow::create_escrow))
                .route("", web::get().to(escrow::list_escrows))
                .route("/{id}", web::get().to(escrow::get_escrow))
                .route("/{id}/invite", web::post().to(escrow::invite))
                .route("/{id}/accept", web::post().to(escrow::accept)),
        )
        .service(
            web::scope("/api/kyc")
                .wrap(RequireAuth)
                .route("/me", web::get().to(kyc::get_my_kyc))
                .route("/me", web::put().to(kyc::put_my_kyc)),
        );
}
