//! Server configuration
//!
//! Values come from environment variables (optionally via a `.env` file
//! loaded in `main`). Out-of-range values are clamped with a warning.

use std::env;

use anyhow::{bail, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Default r2d2 pool size. Override via DB_POOL_SIZE.
pub const DEFAULT_DB_POOL_SIZE: u32 = 10;
pub const MIN_DB_POOL_SIZE: u32 = 1;
pub const MAX_DB_POOL_SIZE: u32 = 64;

/// Default SQLite busy timeout. Override via DB_BUSY_TIMEOUT_MS.
pub const DEFAULT_DB_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_address: String,
    pub db_pool_size: u32,
    pub db_busy_timeout_ms: u64,
}

impl ServerConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) if !url.trim().is_empty() => url,
            _ => bail!("DATABASE_URL must be set"),
        };

        let bind_address = lookup("BIND_ADDRESS")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let db_pool_size = lookup("DB_POOL_SIZE")
            .and_then(|v| v.parse().ok())
            .map(|size: u32| {
                if size < MIN_DB_POOL_SIZE {
                    tracing::warn!(size, min = MIN_DB_POOL_SIZE, "DB_POOL_SIZE below minimum, using minimum");
                    MIN_DB_POOL_SIZE
                } else if size > MAX_DB_POOL_SIZE {
                    tracing::warn!(size, max = MAX_DB_POOL_SIZE, "DB_POOL_SIZE above maximum, using maximum");
                    MAX_DB_POOL_SIZE
                } else {
                    size
                }
            })
            .unwrap_or(DEFAULT_DB_POOL_SIZE);

        let db_busy_timeout_ms = lookup("DB_BUSY_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DB_BUSY_TIMEOUT_MS);

        Ok(Self {
            database_url,
            bind_address,
            db_pool_size,
            db_busy_timeout_ms,
        })
    }
}
