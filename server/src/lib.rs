//! Multi-party escrow workflow server
//!
//! Brokers create transactions, invite a co-broker, buyer and seller, collect
//! per-role KYC data and move the transaction to ACTIVE once every
//! participant has accepted.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod telemetry;
