//! User accounts
//!
//! A user is identified by a unique email. The `is_broker` flag is the
//! broker capability checked when creating and inviting on escrows.

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::schema::users;

/// User model - field order matches schema.rs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub is_broker: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub is_broker: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl NewUser {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            full_name: full_name.into(),
            is_broker: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl User {
    /// Insert a new user. Duplicate emails are reported as `Conflict`.
    pub fn create(conn: &mut SqliteConnection, new_user: NewUser) -> EscrowResult<User> {
        let user_id = new_user.id.clone();

        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => EscrowError::Conflict("A user with this email already exists".to_string()),
                other => EscrowError::Database(other),
            })?;

        Self::find_by_id(conn, &user_id)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, user_id: &str) -> EscrowResult<User> {
        users::table
            .filter(users::id.eq(user_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| EscrowError::not_found(format!("User {} not found", user_id)))
    }

    /// Exact-match lookup; absence is not an error
    pub fn find_by_email(conn: &mut SqliteConnection, email: &str) -> EscrowResult<Option<User>> {
        Ok(users::table
            .filter(users::email.eq(email))
            .first(conn)
            .optional()?)
    }

    /// Grant or revoke the broker capability
    pub fn set_broker(conn: &mut SqliteConnection, user_id: &str, is_broker: bool) -> EscrowResult<()> {
        let updated = diesel::update(users::table.filter(users::id.eq(user_id)))
            .set((
                users::is_broker.eq(is_broker),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        if updated == 0 {
            return Err(EscrowError::not_found(format!("User {} not found", user_id)));
        }
        Ok(())
    }
}
