//! Shared fixtures for integration tests

#![allow(dead_code)]

use diesel::SqliteConnection;

use escrow_server::db::establish_in_memory;
use escrow_server::models::escrow::{Currency, PropertyType, TransactionType};
use escrow_server::models::user::{NewUser, User};
use escrow_server::services::escrow::{
    CreateEscrowRequest, EscrowLifecycle, EscrowTransactionView, InviteRequest,
};

pub const BROKER: &str = "broker@example.com";
pub const CO_BROKER: &str = "cobroker@example.com";
pub const BUYER: &str = "buyer@example.com";
pub const SELLER: &str = "seller@example.com";

pub fn conn() -> SqliteConnection {
    establish_in_memory().expect("in-memory database")
}

pub fn user(conn: &mut SqliteConnection, email: &str) -> User {
    User::create(conn, NewUser::new(email, "Test User")).expect("create user")
}

pub fn broker(conn: &mut SqliteConnection, email: &str) -> User {
    let created = user(conn, email);
    User::set_broker(conn, &created.id, true).expect("grant broker");
    User::find_by_id(conn, &created.id).expect("reload broker")
}

pub fn create_request() -> CreateEscrowRequest {
    CreateEscrowRequest {
        agreement_name: "Casa Roma Norte".to_string(),
        currency: Currency::Mxn,
        transaction_type: TransactionType::PropertySale,
        property_type: PropertyType::House,
        property_value: Some("4500000.00".parse().expect("decimal")),
        estimated_closing_date: None,
        property_address: "Colima 123, CDMX".to_string(),
    }
}

pub fn create(conn: &mut SqliteConnection, creator: &User) -> EscrowTransactionView {
    EscrowLifecycle::new(conn)
        .create_transaction(creator, create_request())
        .expect("create transaction")
}

pub fn buyer_and_seller() -> InviteRequest {
    InviteRequest {
        buyer_email: BUYER.to_string(),
        seller_email: Some(SELLER.to_string()),
        ..Default::default()
    }
}

pub fn with_co_broker(broker_pct: &str, co_pct: &str) -> InviteRequest {
    InviteRequest {
        cobroker_email: Some(CO_BROKER.to_string()),
        buyer_email: BUYER.to_string(),
        seller_email: Some(SELLER.to_string()),
        broker_share_pct: Some(broker_pct.parse().expect("decimal")),
        co_broker_share_pct: Some(co_pct.parse().expect("decimal")),
    }
}
