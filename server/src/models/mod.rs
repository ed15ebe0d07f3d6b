//! Diesel models for the escrow workflow

pub mod broker_request;
pub mod commission_split;
pub mod decimal;
pub mod escrow;
pub mod escrow_participant;
pub mod kyc;
pub mod user;
