//! Commission split between the broker and an optional co-broker

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::models::decimal::Decimal2;
use crate::schema::commission_splits;

/// Split row - field order matches schema.rs. Shares are integer hundredths
/// of a percent (`6000` = 60.00%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = commission_splits)]
pub struct CommissionSplit {
    pub id: String,
    pub transaction_id: String,
    pub broker_id: String,
    pub co_broker_id: Option<String>,
    pub co_broker_email: Option<String>,
    pub broker_share_hundredths: i32,
    pub co_broker_share_hundredths: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Values written on upsert; keyed by `transaction_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitValues {
    pub transaction_id: String,
    pub broker_id: String,
    /// Registered co-broker user, if the invited email resolved to one
    pub co_broker_id: Option<String>,
    /// Invited co-broker email, kept even when it resolved to no user
    pub co_broker_email: Option<String>,
    pub broker_share: Decimal2,
    pub co_broker_share: Option<Decimal2>,
}

impl SplitValues {
    /// A co-broker is present when one was invited or resolved
    pub fn has_co_broker(&self) -> bool {
        self.co_broker_id.is_some() || self.co_broker_email.is_some()
    }
}

#[derive(Insertable)]
#[diesel(table_name = commission_splits)]
struct NewCommissionSplit {
    id: String,
    transaction_id: String,
    broker_id: String,
    co_broker_id: Option<String>,
    co_broker_email: Option<String>,
    broker_share_hundredths: i32,
    co_broker_share_hundredths: Option<i32>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

fn to_column(share: Decimal2) -> EscrowResult<i32> {
    i32::try_from(share.hundredths())
        .map_err(|_| EscrowError::validation(format!("Share {} is out of range", share)))
}

impl CommissionSplit {
    /// Insert or replace the split for a transaction. Callers validate the
    /// values first (see `services::commission::validate_split`).
    pub fn upsert(conn: &mut SqliteConnection, values: &SplitValues) -> EscrowResult<CommissionSplit> {
        let now = Utc::now().naive_utc();
        let broker_share = to_column(values.broker_share)?;
        let co_broker_share = values.co_broker_share.map(to_column).transpose()?;

        let row = NewCommissionSplit {
            id: Uuid::new_v4().to_string(),
            transaction_id: values.transaction_id.clone(),
            broker_id: values.broker_id.clone(),
            co_broker_id: values.co_broker_id.clone(),
            co_broker_email: values.co_broker_email.clone(),
            broker_share_hundredths: broker_share,
            co_broker_share_hundredths: co_broker_share,
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(commission_splits::table)
            .values(&row)
            .on_conflict(commission_splits::transaction_id)
            .do_update()
            .set((
                commission_splits::broker_id.eq(row.broker_id.clone()),
                commission_splits::co_broker_id.eq(row.co_broker_id.clone()),
                commission_splits::co_broker_email.eq(row.co_broker_email.clone()),
                commission_splits::broker_share_hundredths.eq(broker_share),
                commission_splits::co_broker_share_hundredths.eq(co_broker_share),
                commission_splits::updated_at.eq(now),
            ))
            .execute(conn)?;

        Self::find_by_transaction(conn, &values.transaction_id)?
            .ok_or_else(|| EscrowError::Internal("Commission split missing after upsert".to_string()))
    }

    pub fn find_by_transaction(
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> EscrowResult<Option<CommissionSplit>> {
        Ok(commission_splits::table
            .filter(commission_splits::transaction_id.eq(transaction_id))
            .first(conn)
            .optional()?)
    }

    pub fn broker_share(&self) -> Decimal2 {
        Decimal2::from_hundredths(i64::from(self.broker_share_hundredths))
    }

    pub fn co_broker_share(&self) -> Option<Decimal2> {
        self.co_broker_share_hundredths
            .map(|v| Decimal2::from_hundredths(i64::from(v)))
    }
}
