//! Escrow transaction model, its enums and the status state machine

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EscrowError, EscrowResult};
use crate::schema::escrow_transactions;

/// Declares a closed string-backed enum with `as_str`, `FromStr` and
/// SCREAMING_SNAKE_CASE serde, matching the values stored in the database.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::EscrowError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err($crate::error::EscrowError::validation(format!(
                        "Invalid {}: {}",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use string_enum;

string_enum! {
    Currency {
        Usd => "USD",
        Mxn => "MXN",
        Eur => "EUR",
    }
}

string_enum! {
    TransactionType {
        BrokerageCommission => "BROKERAGE_COMMISSION",
        PropertySale => "PROPERTY_SALE",
    }
}

string_enum! {
    PropertyType {
        House => "HOUSE",
        Apartment => "APARTMENT",
        Land => "LAND",
        Commercial => "COMMERCIAL",
        Other => "OTHER",
    }
}

string_enum! {
    /// Lifecycle status of an escrow transaction
    EscrowStatus {
        Draft => "DRAFT",
        Inviting => "INVITING",
        PendingAcceptance => "PENDING_ACCEPTANCE",
        Active => "ACTIVE",
        Cancelled => "CANCELLED",
        Completed => "COMPLETED",
    }
}

impl EscrowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EscrowStatus::Cancelled | EscrowStatus::Completed)
    }

    /// Allowed edges of the lifecycle.
    ///
    /// PENDING_ACCEPTANCE -> PENDING_ACCEPTANCE and ACTIVE -> PENDING_ACCEPTANCE
    /// are re-invites, which reset consent. INVITING -> ACTIVE happens when
    /// every participant (only the creating broker, before any invite) has
    /// accepted. Accept itself never moves an ACTIVE escrow.
    pub fn can_transition_to(&self, next: EscrowStatus) -> bool {
        use EscrowStatus::*;
        matches!(
            (*self, next),
            (Draft, Inviting)
                | (Draft, Cancelled)
                | (Inviting, PendingAcceptance)
                | (Inviting, Active)
                | (Inviting, Cancelled)
                | (PendingAcceptance, PendingAcceptance)
                | (PendingAcceptance, Active)
                | (PendingAcceptance, Cancelled)
                | (Active, PendingAcceptance)
                | (Active, Completed)
                | (Active, Cancelled)
        )
    }

    /// Checked transition; every status change goes through here
    pub fn transition(self, next: EscrowStatus) -> EscrowResult<EscrowStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(EscrowError::validation(format!(
                "Cannot move escrow from {} to {}",
                self, next
            )))
        }
    }
}

/// Escrow transaction row - field order matches schema.rs
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Identifiable)]
#[diesel(table_name = escrow_transactions)]
pub struct EscrowTransaction {
    pub id: String,
    pub created_by: String,
    pub agreement_name: String,
    pub currency: String,
    pub transaction_type: String,
    pub property_type: String,
    pub property_value_cents: Option<i64>,
    pub estimated_closing_date: Option<NaiveDate>,
    pub property_address: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = escrow_transactions)]
pub struct NewEscrowTransaction {
    pub id: String,
    pub created_by: String,
    pub agreement_name: String,
    pub currency: String,
    pub transaction_type: String,
    pub property_type: String,
    pub property_value_cents: Option<i64>,
    pub estimated_closing_date: Option<NaiveDate>,
    pub property_address: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Default for NewEscrowTransaction {
    fn default() -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            created_by: String::new(),
            agreement_name: String::new(),
            currency: Currency::Usd.as_str().to_string(),
            transaction_type: TransactionType::PropertySale.as_str().to_string(),
            property_type: PropertyType::Other.as_str().to_string(),
            property_value_cents: None,
            estimated_closing_date: None,
            property_address: String::new(),
            status: EscrowStatus::Draft.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl EscrowTransaction {
    pub fn create(
        conn: &mut SqliteConnection,
        new_transaction: NewEscrowTransaction,
    ) -> EscrowResult<EscrowTransaction> {
        let transaction_id = new_transaction.id.clone();

        diesel::insert_into(escrow_transactions::table)
            .values(&new_transaction)
            .execute(conn)
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to insert escrow transaction");
                EscrowError::Database(e)
            })?;

        Self::find_by_id(conn, &transaction_id)
    }

    pub fn find_by_id(conn: &mut SqliteConnection, transaction_id: &str) -> EscrowResult<EscrowTransaction> {
        escrow_transactions::table
            .filter(escrow_transactions::id.eq(transaction_id))
            .first(conn)
            .optional()?
            .ok_or_else(|| {
                EscrowError::not_found(format!("Escrow transaction {} not found", transaction_id))
            })
    }

    /// Transactions created by the user or in `extra_ids`, newest first
    pub fn find_created_by_or_in(
        conn: &mut SqliteConnection,
        user_id: &str,
        extra_ids: &[String],
    ) -> EscrowResult<Vec<EscrowTransaction>> {
        Ok(escrow_transactions::table
            .filter(
                escrow_transactions::created_by
                    .eq(user_id)
                    .or(escrow_transactions::id.eq_any(extra_ids)),
            )
            .order(escrow_transactions::created_at.desc())
            .load(conn)?)
    }

    /// Persist a status that has already passed `EscrowStatus::transition`
    pub fn update_status(
        conn: &mut SqliteConnection,
        transaction_id: &str,
        status: EscrowStatus,
    ) -> EscrowResult<()> {
        diesel::update(escrow_transactions::table.filter(escrow_transactions::id.eq(transaction_id)))
            .set((
                escrow_transactions::status.eq(status.as_str()),
                escrow_transactions::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;
        Ok(())
    }

    /// Delete a transaction; participants, split and KYC rows cascade
    pub fn delete(conn: &mut SqliteConnection, transaction_id: &str) -> EscrowResult<()> {
        diesel::delete(escrow_transactions::table.filter(escrow_transactions::id.eq(transaction_id)))
            .execute(conn)?;
        Ok(())
    }

    pub fn status(&self) -> EscrowResult<EscrowStatus> {
        self.status.parse().map_err(|_| corrupt("status", &self.status))
    }

    pub fn currency(&self) -> EscrowResult<Currency> {
        self.currency.parse().map_err(|_| corrupt("currency", &self.currency))
    }

    pub fn transaction_type(&self) -> EscrowResult<TransactionType> {
        self.transaction_type
            .parse()
            .map_err(|_| corrupt("transaction_type", &self.transaction_type))
    }

    pub fn property_type(&self) -> EscrowResult<PropertyType> {
        self.property_type
            .parse()
            .map_err(|_| corrupt("property_type", &self.property_type))
    }
}

fn corrupt(field: &str, value: &str) -> EscrowError {
    EscrowError::Internal(format!("Stored escrow {} is invalid: {}", field, value))
}
