//! Escrow participants
//!
//! A participant is a party attached to one transaction by (email, role).
//! The user link is optional: invitees may not have an account yet and get
//! linked when they accept.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::models::escrow::string_enum;
use crate::schema::escrow_participants;

string_enum! {
    /// Participant role within an escrow
    EscrowRole {
        Broker => "BROKER",
        CoBroker => "CO_BROKER",
        Buyer => "BUYER",
        Seller => "SELLER",
    }
}

/// Participant row - field order matches schema.rs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = escrow_participants)]
pub struct EscrowParticipant {
    pub id: String,
    pub transaction_id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub role: String,
    pub has_accepted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = escrow_participants)]
struct NewEscrowParticipant {
    id: String,
    transaction_id: String,
    user_id: Option<String>,
    email: String,
    role: String,
    has_accepted: bool,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

/// Unique key of a participant within a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantKey<'a> {
    pub transaction_id: &'a str,
    pub email: &'a str,
    pub role: EscrowRole,
}

impl<'a> ParticipantKey<'a> {
    pub fn new(transaction_id: &'a str, email: &'a str, role: EscrowRole) -> Self {
        Self {
            transaction_id,
            email,
            role,
        }
    }

    fn to_new(&self, user_id: Option<&str>) -> NewEscrowParticipant {
        let now = Utc::now().naive_utc();
        NewEscrowParticipant {
            id: Uuid::new_v4().to_string(),
            transaction_id: self.transaction_id.to_string(),
            user_id: user_id.map(str::to_string),
            email: self.email.to_string(),
            role: self.role.as_str().to_string(),
            has_accepted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl EscrowParticipant {
    pub fn find_by_key(
        conn: &mut SqliteConnection,
        key: &ParticipantKey<'_>,
    ) -> EscrowResult<Option<EscrowParticipant>> {
        Ok(escrow_participants::table
            .filter(escrow_participants::transaction_id.eq(key.transaction_id))
            .filter(escrow_participants::email.eq(key.email))
            .filter(escrow_participants::role.eq(key.role.as_str()))
            .first(conn)
            .optional()?)
    }

    /// Insert the participant if the key is free; an existing record is
    /// returned untouched (the user link is only applied on insert)
    pub fn get_or_create(
        conn: &mut SqliteConnection,
        key: &ParticipantKey<'_>,
        user_id: Option<&str>,
    ) -> EscrowResult<EscrowParticipant> {
        diesel::insert_into(escrow_participants::table)
            .values(&key.to_new(user_id))
            .on_conflict((
                escrow_participants::transaction_id,
                escrow_participants::email,
                escrow_participants::role,
            ))
            .do_nothing()
            .execute(conn)?;

        Self::find_by_key(conn, key)?
            .ok_or_else(|| EscrowError::Internal("Participant missing after upsert".to_string()))
    }

    /// Insert or update the participant with acceptance reset to false.
    /// Re-inviting a party always clears a previous acceptance.
    pub fn upsert_pending(
        conn: &mut SqliteConnection,
        key: &ParticipantKey<'_>,
    ) -> EscrowResult<EscrowParticipant> {
        diesel::insert_into(escrow_participants::table)
            .values(&key.to_new(None))
            .on_conflict((
                escrow_participants::transaction_id,
                escrow_participants::email,
                escrow_participants::role,
            ))
            .do_update()
            .set((
                escrow_participants::has_accepted.eq(false),
                escrow_participants::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        Self::find_by_key(conn, key)?
            .ok_or_else(|| EscrowError::Internal("Participant missing after upsert".to_string()))
    }

    /// All participants of a transaction in creation order
    pub fn find_by_transaction(
        conn: &mut SqliteConnection,
        transaction_id: &str,
    ) -> EscrowResult<Vec<EscrowParticipant>> {
        Ok(escrow_participants::table
            .filter(escrow_participants::transaction_id.eq(transaction_id))
            .order((escrow_participants::created_at.asc(), escrow_participants::id.asc()))
            .load(conn)?)
    }

    /// Transaction ids where the user is linked or invited by email
    pub fn transaction_ids_for(
        conn: &mut SqliteConnection,
        user_id: &str,
        email: &str,
    ) -> EscrowResult<Vec<String>> {
        let mut ids: Vec<String> = escrow_participants::table
            .filter(escrow_participants::user_id.eq(user_id))
            .select(escrow_participants::transaction_id)
            .load(conn)?;

        let by_email: Vec<String> = escrow_participants::table
            .filter(escrow_participants::email.eq(email))
            .select(escrow_participants::transaction_id)
            .load(conn)?;

        ids.extend(by_email);
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// First participant (by creation order) linked to the user, across all
    /// transactions
    pub fn find_first_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
    ) -> EscrowResult<Option<EscrowParticipant>> {
        Ok(escrow_participants::table
            .filter(escrow_participants::user_id.eq(user_id))
            .order((escrow_participants::created_at.asc(), escrow_participants::id.asc()))
            .first(conn)
            .optional()?)
    }

    /// Set the acceptance flag and the user link in one update
    pub fn mark_accepted(
        conn: &mut SqliteConnection,
        participant_id: &str,
        user_id: &str,
    ) -> EscrowResult<()> {
        diesel::update(escrow_participants::table.filter(escrow_participants::id.eq(participant_id)))
            .set((
                escrow_participants::user_id.eq(Some(user_id)),
                escrow_participants::has_accepted.eq(true),
                escrow_participants::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        Ok(())
    }

    pub fn count_pending(conn: &mut SqliteConnection, transaction_id: &str) -> EscrowResult<i64> {
        Ok(escrow_participants::table
            .filter(escrow_participants::transaction_id.eq(transaction_id))
            .filter(escrow_participants::has_accepted.eq(false))
            .count()
            .get_result(conn)?)
    }

    pub fn count_with_role(
        conn: &mut SqliteConnection,
        transaction_id: &str,
        role: EscrowRole,
    ) -> EscrowResult<i64> {
        Ok(escrow_participants::table
            .filter(escrow_participants::transaction_id.eq(transaction_id))
            .filter(escrow_participants::role.eq(role.as_str()))
            .count()
            .get_result(conn)?)
    }

    pub fn role(&self) -> EscrowResult<EscrowRole> {
        self.role.parse().map_err(|_| {
            EscrowError::Internal(format!("Stored participant role is invalid: {}", self.role))
        })
    }
}
