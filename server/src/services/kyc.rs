//! KYC profile retrieval and replacement for the caller's participant

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{EscrowError, EscrowResult};
use crate::logging::sanitize::sanitize_id;
use crate::models::escrow_participant::{EscrowParticipant, EscrowRole};
use crate::models::kyc::{
    BrokerLicense, FundsDetails, KycDetails, KycIdentity, KycKind, KycProfile, KycRecord,
};
use crate::models::user::User;

const DOB_FORMAT: &str = "%Y-%m-%d";

/// Full-replace payload; which optional fields matter depends on the
/// caller's role
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct KycPayload {
    #[validate(length(min = 1, max = 255, message = "Full legal name is required"))]
    pub full_legal_name: String,
    #[validate(length(min = 1, max = 100, message = "National ID number is required"))]
    pub national_id_number: String,
    #[validate(custom = "validate_dob")]
    pub dob: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, max = 255, message = "Occupation is required"))]
    pub occupation: String,
    #[serde(default)]
    pub source_of_funds: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub license_state: Option<String>,
    #[serde(default)]
    pub brokerage_firm_name: Option<String>,
}

fn validate_dob(dob: &str) -> Result<(), validator::ValidationError> {
    NaiveDate::parse_from_str(dob, DOB_FORMAT)
        .map(|_| ())
        .map_err(|_| {
            let mut err = validator::ValidationError::new("invalid_date");
            err.message = Some("dob must be a YYYY-MM-DD date".into());
            err
        })
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl KycPayload {
    /// Common fields with surrounding whitespace removed, so blank values
    /// fail the length checks
    fn trimmed(self) -> Self {
        Self {
            full_legal_name: self.full_legal_name.trim().to_string(),
            national_id_number: self.national_id_number.trim().to_string(),
            dob: self.dob.trim().to_string(),
            address: self.address.trim().to_string(),
            occupation: self.occupation.trim().to_string(),
            ..self
        }
    }

    /// Build the typed record for `kind`, checking the variant's required
    /// fields
    fn into_record(self, kind: KycKind) -> EscrowResult<KycRecord> {
        let payload = self.trimmed();
        payload.validate()?;

        let dob = NaiveDate::parse_from_str(&payload.dob, DOB_FORMAT)
            .map_err(|_| EscrowError::validation("dob: dob must be a YYYY-MM-DD date"))?;

        let details = match kind {
            KycKind::Buyer | KycKind::Seller => {
                let funds = FundsDetails {
                    source_of_funds: non_blank(&payload.source_of_funds),
                    tax_id: non_blank(&payload.tax_id),
                };
                if kind == KycKind::Buyer {
                    KycDetails::Buyer(funds)
                } else {
                    KycDetails::Seller(funds)
                }
            }
            KycKind::Broker => {
                let required = [
                    ("license_number", non_blank(&payload.license_number)),
                    ("license_state", non_blank(&payload.license_state)),
                    ("brokerage_firm_name", non_blank(&payload.brokerage_firm_name)),
                ];
                let missing: Vec<&str> = required
                    .iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(name, _)| *name)
                    .collect();
                if !missing.is_empty() {
                    return Err(EscrowError::validation(format!(
                        "Broker KYC requires: {}",
                        missing.join(", ")
                    )));
                }
                let [(_, license_number), (_, license_state), (_, brokerage_firm_name)] = required;
                KycDetails::Broker(BrokerLicense {
                    license_number: license_number.unwrap_or_default(),
                    license_state: license_state.unwrap_or_default(),
                    brokerage_firm_name: brokerage_firm_name.unwrap_or_default(),
                })
            }
        };

        Ok(KycRecord {
            identity: KycIdentity {
                full_legal_name: payload.full_legal_name,
                national_id_number: payload.national_id_number,
                dob,
                address: payload.address,
                occupation: payload.occupation,
            },
            details,
        })
    }
}

/// KYC state of the caller's participant. `profile` is null until the
/// first successful PUT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycView {
    pub participant_id: String,
    pub participant_role: EscrowRole,
    pub kind: KycKind,
    pub profile: Option<KycRecord>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// The caller's participant: the first one linked to their account
fn participant_for(conn: &mut SqliteConnection, user: &User) -> EscrowResult<(EscrowParticipant, EscrowRole)> {
    let participant = EscrowParticipant::find_first_for_user(conn, &user.id)?
        .ok_or_else(|| EscrowError::not_found("No escrow participation found for user."))?;
    let role = participant.role()?;
    Ok((participant, role))
}

fn view(participant: &EscrowParticipant, role: EscrowRole, stored: Option<KycProfile>) -> EscrowResult<KycView> {
    let (profile, created_at, updated_at) = match stored {
        Some(row) => (Some(row.to_record()?), Some(row.created_at), Some(row.updated_at)),
        None => (None, None, None),
    };

    Ok(KycView {
        participant_id: participant.id.clone(),
        participant_role: role,
        kind: KycKind::for_role(role),
        profile,
        created_at,
        updated_at,
    })
}

/// Stored profile for the caller, or an empty one of the right kind
pub fn get_my_kyc(conn: &mut SqliteConnection, user: &User) -> EscrowResult<KycView> {
    let (participant, role) = participant_for(conn, user)?;
    let stored = KycProfile::find_by_participant(conn, &participant.id)?;
    view(&participant, role, stored)
}

/// Replace the caller's profile
pub fn put_my_kyc(conn: &mut SqliteConnection, user: &User, payload: KycPayload) -> EscrowResult<KycView> {
    conn.immediate_transaction::<_, EscrowError, _>(|conn| {
        let (participant, role) = participant_for(conn, user)?;
        let kind = KycKind::for_role(role);
        let record = payload.into_record(kind)?;

        let stored = KycProfile::upsert(conn, &participant.id, &record)?;
        info!(
            participant = %sanitize_id(&participant.id),
            kind = %kind,
            "KYC profile saved"
        );

        view(&participant, role, Some(stored))
    })
}
