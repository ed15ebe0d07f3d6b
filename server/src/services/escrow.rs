//! Escrow lifecycle service
//!
//! Owns the transaction status and drives the roster and the commission
//! split. Every mutating operation runs in one immediate SQLite transaction
//! so the read-modify-write of the status is atomic.

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::error::{EscrowError, EscrowResult};
use crate::logging::sanitize::{sanitize_email, sanitize_id, sanitize_opt_email};
use crate::models::commission_split::{CommissionSplit, SplitValues};
use crate::models::decimal::Decimal2;
use crate::models::escrow::{
    Currency, EscrowStatus, EscrowTransaction, NewEscrowTransaction, PropertyType, TransactionType,
};
use crate::models::escrow_participant::{EscrowParticipant, EscrowRole};
use crate::models::user::User;
use crate::services::{commission, roster};

/// Property values are stored with `max_digits = 12, decimal_places = 2`
const MAX_PROPERTY_VALUE_INTEGER_DIGITS: usize = 10;

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateEscrowRequest {
    #[validate(length(min = 1, max = 200, message = "Agreement name must be 1-200 characters"))]
    pub agreement_name: String,
    pub currency: Currency,
    pub transaction_type: TransactionType,
    pub property_type: PropertyType,
    #[serde(default)]
    pub property_value: Option<Decimal2>,
    #[serde(default)]
    pub estimated_closing_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "Property address is required"))]
    pub property_address: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InviteRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid co-broker email"))]
    pub cobroker_email: Option<String>,
    #[validate(email(message = "Invalid buyer email"))]
    pub buyer_email: String,
    #[serde(default)]
    #[validate(email(message = "Invalid seller email"))]
    pub seller_email: Option<String>,
    #[serde(default)]
    pub broker_share_pct: Option<Decimal2>,
    #[serde(default)]
    pub co_broker_share_pct: Option<Decimal2>,
}

impl InviteRequest {
    /// Trim emails and treat blank optional ones as absent
    fn normalized(self) -> Self {
        Self {
            cobroker_email: non_blank(self.cobroker_email),
            buyer_email: self.buyer_email.trim().to_string(),
            seller_email: non_blank(self.seller_email),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AcceptRequest {
    /// Email to match the participant by; defaults to the caller's own
    #[serde(default)]
    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,
    /// Accepted for client compatibility, not checked
    #[serde(default)]
    pub token: Option<String>,
}

impl AcceptRequest {
    fn normalized(self) -> Self {
        Self {
            email: non_blank(self.email),
            ..self
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Response views
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: String,
    pub email: String,
    pub role: EscrowRole,
    pub has_accepted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionSplitView {
    pub broker_id: String,
    pub co_broker_id: Option<String>,
    pub co_broker_email: Option<String>,
    pub broker_share_pct: Decimal2,
    pub co_broker_share_pct: Option<Decimal2>,
}

/// Transaction with its participants and split, as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransactionView {
    pub id: String,
    pub created_by: String,
    pub agreement_name: String,
    pub currency: Currency,
    pub transaction_type: TransactionType,
    pub property_type: PropertyType,
    pub property_value: Option<Decimal2>,
    pub estimated_closing_date: Option<NaiveDate>,
    pub property_address: String,
    pub status: EscrowStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub participants: Vec<ParticipantView>,
    pub commission_split: Option<CommissionSplitView>,
}

impl ParticipantView {
    fn from_row(row: EscrowParticipant) -> EscrowResult<Self> {
        Ok(Self {
            role: row.role()?,
            id: row.id,
            email: row.email,
            has_accepted: row.has_accepted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<CommissionSplit> for CommissionSplitView {
    fn from(split: CommissionSplit) -> Self {
        Self {
            broker_share_pct: split.broker_share(),
            co_broker_share_pct: split.co_broker_share(),
            broker_id: split.broker_id,
            co_broker_id: split.co_broker_id,
            co_broker_email: split.co_broker_email,
        }
    }
}

fn load_view(conn: &mut SqliteConnection, tx: EscrowTransaction) -> EscrowResult<EscrowTransactionView> {
    let participants = EscrowParticipant::find_by_transaction(conn, &tx.id)?
        .into_iter()
        .map(ParticipantView::from_row)
        .collect::<EscrowResult<Vec<_>>>()?;
    let commission_split = CommissionSplit::find_by_transaction(conn, &tx.id)?.map(Into::into);

    Ok(EscrowTransactionView {
        currency: tx.currency()?,
        transaction_type: tx.transaction_type()?,
        property_type: tx.property_type()?,
        status: tx.status()?,
        property_value: tx.property_value_cents.map(Decimal2::from_hundredths),
        id: tx.id,
        created_by: tx.created_by,
        agreement_name: tx.agreement_name,
        estimated_closing_date: tx.estimated_closing_date,
        property_address: tx.property_address,
        created_at: tx.created_at,
        updated_at: tx.updated_at,
        participants,
        commission_split,
    })
}

fn to_property_cents(value: Decimal2) -> EscrowResult<i64> {
    if value.integer_digits() > MAX_PROPERTY_VALUE_INTEGER_DIGITS {
        return Err(EscrowError::validation(format!(
            "property_value must have at most {} digits before the decimal point",
            MAX_PROPERTY_VALUE_INTEGER_DIGITS
        )));
    }
    Ok(value.hundredths())
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Transaction lifecycle manager bound to one database connection
pub struct EscrowLifecycle<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> EscrowLifecycle<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a transaction in INVITING with the creator as BROKER participant
    ///
    /// # Errors
    /// - `Authorization` if the creator is not a broker
    /// - `Validation` if the payload is malformed
    pub fn create_transaction(
        &mut self,
        creator: &User,
        request: CreateEscrowRequest,
    ) -> EscrowResult<EscrowTransactionView> {
        if !creator.is_broker {
            return Err(EscrowError::unauthorized(
                "Only brokers can create escrow transactions",
            ));
        }
        request.validate()?;

        let property_value_cents = request.property_value.map(to_property_cents).transpose()?;
        let status = EscrowStatus::Draft.transition(EscrowStatus::Inviting)?;

        self.conn.immediate_transaction::<_, EscrowError, _>(|conn| {
            let tx = EscrowTransaction::create(
                conn,
                NewEscrowTransaction {
                    created_by: creator.id.clone(),
                    agreement_name: request.agreement_name.trim().to_string(),
                    currency: request.currency.as_str().to_string(),
                    transaction_type: request.transaction_type.as_str().to_string(),
                    property_type: request.property_type.as_str().to_string(),
                    property_value_cents,
                    estimated_closing_date: request.estimated_closing_date,
                    property_address: request.property_address,
                    status: status.as_str().to_string(),
                    ..Default::default()
                },
            )?;

            roster::ensure_broker(conn, &tx.id, creator)?;

            info!(
                escrow_id = %sanitize_id(&tx.id),
                creator = %sanitize_id(&creator.id),
                status = %status,
                "Escrow transaction created"
            );

            load_view(conn, tx)
        })
    }

    /// Invite co-broker, buyer and seller and record the commission split
    ///
    /// All roster writes are upserts keyed by (transaction, email, role) and
    /// reset acceptance to false. The split's co-broker link is the user
    /// registered under the co-broker email, or null when there is none.
    ///
    /// # Errors
    /// - `NotFound` if the transaction does not exist
    /// - `Authorization` unless the requester created it and is a broker
    /// - `Validation` on payload, split or status-transition failure
    pub fn invite(
        &mut self,
        transaction_id: &str,
        requester: &User,
        request: InviteRequest,
    ) -> EscrowResult<EscrowTransactionView> {
        let request = request.normalized();

        self.conn.immediate_transaction::<_, EscrowError, _>(|conn| {
            let tx = EscrowTransaction::find_by_id(conn, transaction_id)?;

            if tx.created_by != requester.id || !requester.is_broker {
                return Err(EscrowError::unauthorized(
                    "Only the broker who created this transaction can invite participants",
                ));
            }

            request.validate()?;
            if request.cobroker_email.is_none() && request.seller_email.is_none() {
                return Err(EscrowError::validation(
                    "seller_email is required when no co-broker is specified",
                ));
            }

            let (broker_share, co_broker_share) = commission::shares_for_invitation(
                request.cobroker_email.as_deref(),
                request.broker_share_pct,
                request.co_broker_share_pct,
            )?;
            let next = tx.status()?.transition(EscrowStatus::PendingAcceptance)?;

            roster::ensure_broker(conn, &tx.id, requester)?;
            if let Some(email) = &request.cobroker_email {
                roster::invite_party(conn, &tx.id, email, EscrowRole::CoBroker)?;
            }
            roster::invite_party(conn, &tx.id, &request.buyer_email, EscrowRole::Buyer)?;
            if let Some(email) = &request.seller_email {
                roster::invite_party(conn, &tx.id, email, EscrowRole::Seller)?;
            }

            let co_broker = match &request.cobroker_email {
                Some(email) => User::find_by_email(conn, email)?,
                None => None,
            };
            if let (Some(email), None) = (&request.cobroker_email, &co_broker) {
                warn!(
                    escrow_id = %sanitize_id(&tx.id),
                    cobroker = %sanitize_email(email),
                    "Co-broker email has no registered user, split stored without co-broker link"
                );
            }

            let split = SplitValues {
                transaction_id: tx.id.clone(),
                broker_id: requester.id.clone(),
                co_broker_id: co_broker.map(|u| u.id),
                co_broker_email: request.cobroker_email.clone(),
                broker_share,
                co_broker_share,
            };
            commission::validate_split(&split)?;
            CommissionSplit::upsert(conn, &split)?;

            EscrowTransaction::update_status(conn, &tx.id, next)?;

            info!(
                escrow_id = %sanitize_id(&tx.id),
                buyer = %sanitize_email(&request.buyer_email),
                seller = %sanitize_opt_email(request.seller_email.as_deref()),
                cobroker = %sanitize_opt_email(request.cobroker_email.as_deref()),
                broker_share = %broker_share,
                "Participants invited"
            );

            let tx = EscrowTransaction::find_by_id(conn, &tx.id)?;
            load_view(conn, tx)
        })
    }

    /// Record the requester's acceptance; activates the transaction once
    /// every participant has accepted
    ///
    /// # Errors
    /// - `NotFound` if the transaction or a matching participant is missing
    /// - `Validation` if the email override is malformed
    pub fn accept(
        &mut self,
        transaction_id: &str,
        requester: &User,
        request: AcceptRequest,
    ) -> EscrowResult<EscrowTransactionView> {
        let request = request.normalized();

        self.conn.immediate_transaction::<_, EscrowError, _>(|conn| {
            let tx = EscrowTransaction::find_by_id(conn, transaction_id)?;
            request.validate()?;

            let email = request.email.as_deref().unwrap_or(&requester.email);
            let participant = roster::resolve_acting_participant(conn, &tx.id, requester, email)?;

            let user_link = participant
                .user_id
                .clone()
                .unwrap_or_else(|| requester.id.clone());
            EscrowParticipant::mark_accepted(conn, &participant.id, &user_link)?;

            info!(
                escrow_id = %sanitize_id(&tx.id),
                participant = %sanitize_id(&participant.id),
                role = %participant.role,
                "Participant accepted"
            );

            let current = tx.status()?;
            if roster::all_accepted(conn, &tx.id)? && current.can_transition_to(EscrowStatus::Active) {
                let next = current.transition(EscrowStatus::Active)?;
                EscrowTransaction::update_status(conn, &tx.id, next)?;
                info!(escrow_id = %sanitize_id(&tx.id), "All participants accepted, escrow active");
            }

            let tx = EscrowTransaction::find_by_id(conn, &tx.id)?;
            load_view(conn, tx)
        })
    }

    /// Load one transaction visible to the caller
    ///
    /// The caller must have created it or be a participant by user link or
    /// email.
    pub fn get_transaction(
        &mut self,
        transaction_id: &str,
        caller: &User,
    ) -> EscrowResult<EscrowTransactionView> {
        let tx = EscrowTransaction::find_by_id(self.conn, transaction_id)?;

        if tx.created_by != caller.id {
            let visible = EscrowParticipant::transaction_ids_for(self.conn, &caller.id, &caller.email)?;
            if !visible.contains(&tx.id) {
                return Err(EscrowError::unauthorized(
                    "You are not a participant of this transaction",
                ));
            }
        }

        load_view(self.conn, tx)
    }

    /// Transactions the caller created or takes part in, newest first
    pub fn list_transactions(&mut self, caller: &User) -> EscrowResult<Vec<EscrowTransactionView>> {
        let participating = EscrowParticipant::transaction_ids_for(self.conn, &caller.id, &caller.email)?;

        EscrowTransaction::find_created_by_or_in(self.conn, &caller.id, &participating)?
            .into_iter()
            .map(|tx| load_view(self.conn, tx))
            .collect()
    }

    /// Model-level consistency check of a stored transaction
    ///
    /// The creator must be a broker and the roster must contain a buyer and a
    /// seller. Not called by create, invite or accept.
    pub fn validate_transaction(&mut self, transaction_id: &str) -> EscrowResult<()> {
        let tx = EscrowTransaction::find_by_id(self.conn, transaction_id)?;
        let creator = User::find_by_id(self.conn, &tx.created_by)?;

        let mut problems = Vec::new();
        if !creator.is_broker {
            problems.push("Creator must be a broker.".to_string());
        }

        let missing: Vec<String> = roster::missing_counterparties(self.conn, &tx.id)?
            .into_iter()
            .map(|role| role.as_str().to_lowercase())
            .collect();
        if !missing.is_empty() {
            problems.push(format!(
                "Transaction must include at least one {}.",
                missing.join(" and ")
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(EscrowError::Validation(problems.join(" ")))
        }
    }
}
