//! User registration and broker capability requests

use diesel::prelude::*;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::error::{EscrowError, EscrowResult};
use crate::logging::sanitize::{sanitize_email, sanitize_id};
use crate::models::broker_request::{BrokerRequest, BrokerRequestStatus};
use crate::models::user::{NewUser, User};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 1, max = 150, message = "Full name must be 1-150 characters"))]
    pub full_name: String,
}

/// Create a user without broker capability
pub fn register(conn: &mut SqliteConnection, request: RegisterRequest) -> EscrowResult<User> {
    let request = RegisterRequest {
        email: request.email.trim().to_string(),
        full_name: request.full_name.trim().to_string(),
    };
    request.validate()?;

    let user = User::create(conn, NewUser::new(request.email, request.full_name))?;
    info!(
        user_id = %sanitize_id(&user.id),
        email = %sanitize_email(&user.email),
        "User registered"
    );
    Ok(user)
}

/// Exact email lookup
pub fn find_user_by_email(conn: &mut SqliteConnection, email: &str) -> EscrowResult<Option<User>> {
    User::find_by_email(conn, email)
}

/// Open a broker request; at most one may be pending per user
pub fn request_broker(conn: &mut SqliteConnection, user: &User) -> EscrowResult<BrokerRequest> {
    conn.immediate_transaction::<_, EscrowError, _>(|conn| {
        if BrokerRequest::has_pending(conn, &user.id)? {
            return Err(EscrowError::validation(
                "A pending broker request already exists.",
            ));
        }

        let request = BrokerRequest::create(conn, &user.id)?;
        info!(
            request_id = %sanitize_id(&request.id),
            user_id = %sanitize_id(&user.id),
            "Broker request opened"
        );
        Ok(request)
    })
}

/// Approve or reject a pending request. Approval grants broker capability
/// in the same transaction.
pub fn resolve_broker_request(
    conn: &mut SqliteConnection,
    request_id: &str,
    approve: bool,
) -> EscrowResult<BrokerRequest> {
    conn.immediate_transaction::<_, EscrowError, _>(|conn| {
        let request = BrokerRequest::find_by_id(conn, request_id)?;
        if request.status()? != BrokerRequestStatus::Pending {
            return Err(EscrowError::validation(format!(
                "Broker request is already {}",
                request.status
            )));
        }

        let status = if approve {
            User::set_broker(conn, &request.user_id, true)?;
            BrokerRequestStatus::Approved
        } else {
            BrokerRequestStatus::Rejected
        };
        BrokerRequest::set_status(conn, &request.id, status)?;

        info!(
            request_id = %sanitize_id(&request.id),
            user_id = %sanitize_id(&request.user_id),
            status = status.as_str(),
            "Broker request resolved"
        );

        BrokerRequest::find_by_id(conn, &request.id)
    })
}
