//! Participant roster: invitation upserts, acting-participant resolution and
//! acceptance checks

use diesel::SqliteConnection;
use tracing::debug;

use crate::error::{EscrowError, EscrowResult};
use crate::logging::sanitize::{sanitize_email, sanitize_id};
use crate::models::escrow_participant::{EscrowParticipant, EscrowRole, ParticipantKey};
use crate::models::user::User;

/// Get-or-create the BROKER participant for `broker`. An existing record is
/// never modified.
pub fn ensure_broker(
    conn: &mut SqliteConnection,
    transaction_id: &str,
    broker: &User,
) -> EscrowResult<EscrowParticipant> {
    let key = ParticipantKey::new(transaction_id, &broker.email, EscrowRole::Broker);
    EscrowParticipant::get_or_create(conn, &key, Some(&broker.id))
}

/// Upsert an invited party with acceptance reset to false
pub fn invite_party(
    conn: &mut SqliteConnection,
    transaction_id: &str,
    email: &str,
    role: EscrowRole,
) -> EscrowResult<EscrowParticipant> {
    debug!(
        escrow_id = %sanitize_id(transaction_id),
        email = %sanitize_email(email),
        role = %role,
        "Inviting participant"
    );
    EscrowParticipant::upsert_pending(conn, &ParticipantKey::new(transaction_id, email, role))
}

/// The participant of this transaction linked to `user` or carrying `email`,
/// first by creation order
pub fn resolve_acting_participant(
    conn: &mut SqliteConnection,
    transaction_id: &str,
    user: &User,
    email: &str,
) -> EscrowResult<EscrowParticipant> {
    EscrowParticipant::find_by_transaction(conn, transaction_id)?
        .into_iter()
        .find(|p| p.user_id.as_deref() == Some(user.id.as_str()) || p.email == email)
        .ok_or_else(|| EscrowError::not_found("Participant not found for this transaction"))
}

/// True when no participant of the transaction is still pending
pub fn all_accepted(conn: &mut SqliteConnection, transaction_id: &str) -> EscrowResult<bool> {
    Ok(EscrowParticipant::count_pending(conn, transaction_id)? == 0)
}

/// Counterparty roles (BUYER, SELLER) with no participant in the transaction
pub fn missing_counterparties(
    conn: &mut SqliteConnection,
    transaction_id: &str,
) -> EscrowResult<Vec<EscrowRole>> {
    let mut missing = Vec::new();
    for role in [EscrowRole::Buyer, EscrowRole::Seller] {
        if EscrowParticipant::count_with_role(conn, transaction_id, role)? == 0 {
            missing.push(role);
        }
    }
    Ok(missing)
}
