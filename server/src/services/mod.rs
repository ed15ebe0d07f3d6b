//! Business logic
//!
//! `escrow` owns the transaction lifecycle; `roster` and `commission` are the
//! participant and split rules it drives. `accounts` and `kyc` cover users,
//! broker requests and per-role KYC profiles.

pub mod accounts;
pub mod commission;
pub mod escrow;
pub mod kyc;
pub mod roster;
