//! Requests from users to be granted the broker capability

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::models::escrow::string_enum;
use crate::schema::broker_requests;

string_enum! {
    /// Review state of a broker request
    BrokerRequestStatus {
        Pending => "PENDING",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = broker_requests)]
pub struct BrokerRequest {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = broker_requests)]
struct NewBrokerRequest {
    id: String,
    user_id: String,
    status: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl BrokerRequest {
    pub fn create(conn: &mut SqliteConnection, user_id: &str) -> EscrowResult<BrokerRequest> {
        let now = Utc::now().naive_utc();
        let new_request = NewBrokerRequest {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            status: BrokerRequestStatus::Pending.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(broker_requests::table)
            .values(&new_request)
            .execute(conn)?;

        Self::find_by_id(conn, &new_request.id)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, request_id: &str) -> EscrowResult<BrokerRequest> {
        broker_requests::table
            .filter(broker_requests::id.eq(request_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| EscrowError::not_found(format!("Broker request {} not found", request_id)))
    }

    pub fn has_pending(conn: &mut SqliteConnection, user_id: &str) -> EscrowResult<bool> {
        let count: i64 = broker_requests::table
            .filter(broker_requests::user_id.eq(user_id))
            .filter(broker_requests::status.eq(BrokerRequestStatus::Pending.as_str()))
            .count()
            .get_result(conn)?;

        Ok(count > 0)
    }

    pub fn set_status(
        conn: &mut SqliteConnection,
        request_id: &str,
        status: BrokerRequestStatus,
    ) -> EscrowResult<()> {
        diesel::update(broker_requests::table.filter(broker_requests::id.eq(request_id)))
            .set((
                broker_requests::status.eq(status.as_str()),
                broker_requests::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn status(&self) -> EscrowResult<BrokerRequestStatus> {
        self.status.parse().map_err(|_| {
            EscrowError::Internal(format!("Stored broker request status is invalid: {}", self.status))
        })
    }
}
