//! Health check endpoint for load balancers and monitoring

use std::time::Instant;

use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;

use crate::db::DbPool;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: ComponentHealth,
}

/// Health status of a component
#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: &'static str,
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn healthy(latency_ms: u64) -> Self {
        Self {
            status: "healthy",
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            latency_ms: None,
            error: Some(error),
        }
    }
}

/// `GET /health`
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "escrow-server",
///   "version": "0.1.0",
///   "database": { "status": "healthy", "latency_ms": 1 }
/// }
/// ```
#[get("/health")]
pub async fn health_check(pool: web::Data<DbPool>) -> impl Responder {
    let database = check_database_health(&pool).await;
    let healthy = database.status == "healthy";

    let response = HealthResponse {
        status: if healthy { "healthy" } else { "unhealthy" },
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        database,
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

async fn check_database_health(pool: &DbPool) -> ComponentHealth {
    let start = Instant::now();
    let pool = pool.clone();

    let result = web::block(move || {
        use diesel::prelude::*;
        let mut conn = pool.get().map_err(|e| format!("Connection failed: {}", e))?;
        diesel::sql_query("SELECT 1 AS val")
            .execute(&mut conn)
            .map_err(|e| format!("Query failed: {}", e))
    })
    .await;

    match result {
        Ok(Ok(_)) => ComponentHealth::healthy(start.elapsed().as_millis() as u64),
        Ok(Err(e)) => ComponentHealth::unhealthy(e),
        Err(e) => ComponentHealth::unhealthy(format!("Block error: {}", e)),
    }
}
