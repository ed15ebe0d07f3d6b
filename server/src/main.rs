use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use tracing::info;

use escrow_server::config::ServerConfig;
use escrow_server::db::{create_pool, run_migrations};
use escrow_server::handlers;

#[actix_web::main]
async fn main() -> Result<()> {
    // 1. Load environment variables
    dotenvy::dotenv().ok();

    // 2. Logging
    escrow_server::telemetry::init_telemetry().context("Failed to initialize telemetry")?;

    let config = ServerConfig::from_env().context("Failed to load configuration")?;
    info!(
        bind_address = %config.bind_address,
        pool_size = config.db_pool_size,
        "Starting escrow server"
    );

    // 3. Database pool and schema
    let pool = create_pool(
        &config.database_url,
        config.db_pool_size,
        config.db_busy_timeout_ms,
    )
    .context("Failed to create database connection pool")?;

    {
        let mut conn = pool.get().context("Failed to get DB connection for migrations")?;
        run_migrations(&mut conn).context("Failed to apply migrations")?;
    }
    info!("Database ready");

    // 4. HTTP server
    let bind_address = config.bind_address.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind to {}", bind_address))?
    .run()
    .await
    .context("HTTP server error")?;

    Ok(())
}
